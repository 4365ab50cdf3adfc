//! CLI 日志系统初始化
//!
//! 基于 `tracing-subscriber` 实现分阶段日志控制。日志写到 stderr，
//! stdout 留给脚本输出。

use clap::ValueEnum;
use orbit_config::{LogConfig, LogLevel, Phase};
use std::io;
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    Layer,
};

/// 日志输出格式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// 彩色格式化（开发使用）
    Pretty,
    /// 紧凑格式
    #[default]
    Compact,
    /// JSON 格式（工具集成）
    Json,
}

pub fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Trace => LevelFilter::TRACE,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Off => LevelFilter::OFF,
    }
}

/// 每个阶段一个 target：`orbit::lexer`、`orbit::vm` ...
pub fn targets(log_config: &LogConfig) -> Targets {
    Phase::ALL
        .iter()
        .fold(Targets::new().with_default(level_filter(log_config.global)), |targets, phase| {
            targets.with_target(phase.target(), level_filter(log_config.level_for(*phase)))
        })
        .with_target("orbit::cli", level_filter(log_config.global))
}

/// 使用指定格式和日志配置初始化日志系统
pub fn init(log_config: &LogConfig, format: LogFormat) {
    let layer = create_format_layer(format, io::stderr).with_filter(targets(log_config));
    // 重复初始化（例如测试中）时忽略
    let _ = tracing_subscriber::registry().with(layer).try_init();
}

/// Create formatter layer based on format
fn create_format_layer<W, F>(format: LogFormat, make_writer: F) -> Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>
where
    W: io::Write + 'static,
    F: Fn() -> W + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .without_time()
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_writer(make_writer)
            .boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_follow_phase_overrides() {
        let config = LogConfig {
            global: LogLevel::Warn,
            vm: Some(LogLevel::Trace),
            ..LogConfig::default()
        };
        let targets = targets(&config);
        assert!(targets.would_enable("orbit::vm", &tracing::Level::TRACE));
        assert!(!targets.would_enable("orbit::parser", &tracing::Level::INFO));
        assert!(targets.would_enable("orbit::parser", &tracing::Level::WARN));
        assert!(!targets.would_enable("other", &tracing::Level::INFO));
    }

    #[test]
    fn test_off_disables_everything() {
        let config = LogConfig {
            global: LogLevel::Off,
            ..LogConfig::default()
        };
        assert!(!targets(&config).would_enable("orbit::api", &tracing::Level::ERROR));
    }
}
