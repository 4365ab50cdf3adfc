//! Orbit Config - Pure configuration data structures
//!
//! This crate contains only data structures, no logic or global state.
//! It serves as the shared configuration vocabulary across all Orbit crates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for compiler behavior
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Whether to emit debug information (line tables).
    ///
    /// `None` defers to the build profile: on in debug builds, off in release.
    pub emit_debug_info: Option<bool>,
    /// Whether to disassemble compiled code to the debug log
    pub dump_bytecode: bool,
}

impl CompilerConfig {
    /// 解析最终的 debug 开关：显式参数 > 配置 > 构建模式
    pub fn debug_info(&self, explicit: Option<bool>) -> bool {
        explicit
            .or(self.emit_debug_info)
            .unwrap_or(cfg!(debug_assertions))
    }
}

/// Configuration for execution limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Maximum operand stack size per call
    pub max_stack_size: usize,
    /// Maximum nested call depth (script frames across re-entrant runs)
    pub max_call_depth: usize,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_stack_size: 10240,
            max_call_depth: 256,
        }
    }
}

/// Execution phase enum for phase-specific configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Lexer,
    Parser,
    Compiler,
    Vm,
    Api,
}

impl Phase {
    /// All phases, in pipeline order
    pub const ALL: [Phase; 5] = [
        Phase::Lexer,
        Phase::Parser,
        Phase::Compiler,
        Phase::Vm,
        Phase::Api,
    ];

    /// Get the string name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Lexer => "lexer",
            Phase::Parser => "parser",
            Phase::Compiler => "compiler",
            Phase::Vm => "vm",
            Phase::Api => "api",
        }
    }

    /// Get the log target name for this phase
    pub fn target(&self) -> String {
        format!("orbit::{}", self.as_str())
    }
}

/// 日志级别
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    /// 完全关闭
    Off,
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "off" | "silent" => Ok(LogLevel::Off),
            other => Err(ConfigError::InvalidLogLevel(other.to_string())),
        }
    }
}

/// Logging configuration: a global level plus optional per-phase overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub global: LogLevel,
    pub lexer: Option<LogLevel>,
    pub parser: Option<LogLevel>,
    pub compiler: Option<LogLevel>,
    pub vm: Option<LogLevel>,
    pub api: Option<LogLevel>,
}

impl LogConfig {
    /// Get log level for a specific phase
    pub fn level_for(&self, phase: Phase) -> LogLevel {
        let specific = match phase {
            Phase::Lexer => self.lexer,
            Phase::Parser => self.parser,
            Phase::Compiler => self.compiler,
            Phase::Vm => self.vm,
            Phase::Api => self.api,
        };
        specific.unwrap_or(self.global)
    }
}

/// Project file (`orbit.json`) read by the CLI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// 入口文件路径（相对于项目文件所在目录）
    pub entry: Option<String>,
    pub compiler: CompilerConfig,
    pub limits: LimitConfig,
    pub logging: LogConfig,
}

impl ProjectConfig {
    /// Parse a project file from JSON text
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid log level '{0}'")]
    InvalidLogLevel(String),

    #[error("malformed project file: {0}")]
    Json(#[from] serde_json::Error),
}
