//! API 错误类型
//!
//! 提供统一的错误类型和结构化错误报告。

use serde::Serialize;
use thiserror::Error;

/// 按名字查找失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Failed to find {kind} named {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("Expected {kind} for key {name}. Found {found}")]
    WrongType {
        kind: &'static str,
        name: String,
        found: &'static str,
    },
}

/// Orbit 错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// 语法或语义错误（编译阶段）
    #[error("Compile error: {message}")]
    Compile {
        message: String,
        file: Option<String>,
        line: Option<u32>,
        column: Option<u32>,
    },

    /// include 的文件无法读取
    #[error("Load error: {message}")]
    Load {
        message: String,
        file: Option<String>,
        line: Option<u32>,
    },

    /// 运行时错误
    #[error("Runtime error: {message}")]
    Runtime {
        message: String,
        file: Option<String>,
        line: Option<u32>,
    },

    #[error("{0}")]
    Lookup(#[from] LookupError),

    #[error("Expected {expected} but found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// 实例的存储与类的成员表不再一致
    #[error("Instance no longer matches its class: '{name}' has no storage slot")]
    StaleReference { name: String },

    #[error("No entry point found. Did you forget to compile?")]
    NoEntryPoint,

    #[error("run_main() must be called before reading script variables")]
    MainNotRun,

    #[error("Value belongs to a different context")]
    ForeignValue,

    /// 宿主函数主动返回的错误
    #[error("{0}")]
    Host(String),
}

impl Error {
    /// 宿主函数中构造错误的快捷方式
    pub fn host(message: impl Into<String>) -> Self {
        Error::Host(message.into())
    }

    /// 获取错误行号（如果有）
    pub fn line(&self) -> Option<u32> {
        match self {
            Error::Compile { line, .. } | Error::Load { line, .. } | Error::Runtime { line, .. } => *line,
            _ => None,
        }
    }

    /// 获取错误列号（如果有）
    pub fn column(&self) -> Option<u32> {
        match self {
            Error::Compile { column, .. } => *column,
            _ => None,
        }
    }

    /// 出错的文件名（根源码没有文件名）
    pub fn file(&self) -> Option<&str> {
        match self {
            Error::Compile { file, .. } | Error::Load { file, .. } | Error::Runtime { file, .. } => file.as_deref(),
            _ => None,
        }
    }

    /// 获取错误阶段名称
    pub fn phase(&self) -> &'static str {
        match self {
            Error::Compile { .. } => "compiler",
            Error::Load { .. } => "loader",
            Error::Runtime { .. } | Error::Host(_) => "runtime",
            _ => "api",
        }
    }

    fn error_kind(&self) -> &'static str {
        match self {
            Error::Compile { .. } => "CompileError",
            Error::Load { .. } => "LoadError",
            Error::Runtime { .. } => "RuntimeError",
            Error::Lookup(LookupError::NotFound { .. }) => "NotFound",
            Error::Lookup(LookupError::WrongType { .. }) => "WrongType",
            Error::TypeMismatch { .. } => "TypeMismatch",
            Error::StaleReference { .. } => "StaleReference",
            Error::NoEntryPoint => "NoEntryPoint",
            Error::MainNotRun => "MainNotRun",
            Error::ForeignValue => "ForeignValue",
            Error::Host(_) => "HostError",
        }
    }

    /// 转换为结构化错误报告
    ///
    /// 适用于 Web API、LSP 等需要结构化数据的场景。
    /// CLI 可以直接打印，也可以序列化为 JSON。
    pub fn to_report(&self) -> ErrorReport {
        let message = match self {
            Error::Compile { message, .. } | Error::Load { message, .. } | Error::Runtime { message, .. } => {
                message.clone()
            }
            other => other.to_string(),
        };
        ErrorReport {
            phase: self.phase(),
            file: self.file().map(str::to_string),
            line: self.line(),
            column: self.column(),
            error_kind: self.error_kind().to_string(),
            message,
        }
    }
}

/// 结构化错误报告
///
/// 上层应用（CLI、Web、LSP）可以根据自己的需求格式化。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    /// 错误阶段: compiler, loader, runtime, api
    pub phase: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// 错误行号（1-based，如果有）
    pub line: Option<u32>,
    /// 错误列号（1-based，如果有）
    pub column: Option<u32>,
    /// 错误类型（可用于程序化处理）
    pub error_kind: String,
    /// 人类可读的错误消息
    pub message: String,
}

impl std::fmt::Display for ErrorReport {
    /// 默认的 CLI 友好格式
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(col)) => write!(f, "[{}:{}] {} error: {}", line, col, self.phase, self.message),
            (Some(line), None) => write!(f, "[{}] {} error: {}", line, self.phase, self.message),
            _ => write!(f, "[{}] {} error: {}", self.phase, self.error_kind, self.message),
        }
    }
}

impl ErrorReport {
    /// 转换为 JSON 格式（Web API 使用）
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// 简洁格式（适合终端）
    pub fn to_short(&self) -> String {
        format!("{}: {}", self.phase, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_line_column() {
        let err = Error::Compile {
            message: "Expected expression".to_string(),
            file: None,
            line: Some(3),
            column: Some(7),
        };
        assert_eq!(err.line(), Some(3));
        assert_eq!(err.column(), Some(7));
        assert_eq!(err.phase(), "compiler");
    }

    #[test]
    fn test_runtime_error_has_no_column() {
        let err = Error::Runtime {
            message: "Division by zero".to_string(),
            file: Some("lib.orb".to_string()),
            line: Some(2),
        };
        assert_eq!(err.column(), None);
        assert_eq!(err.file(), Some("lib.orb"));
        assert_eq!(err.to_string(), "Runtime error: Division by zero");
    }

    #[test]
    fn test_lookup_messages() {
        let missing = LookupError::NotFound {
            kind: "Instance",
            name: "player".to_string(),
        };
        assert_eq!(missing.to_string(), "Failed to find Instance named player");

        let wrong = LookupError::WrongType {
            kind: "Instance",
            name: "score".to_string(),
            found: "int",
        };
        assert_eq!(wrong.to_string(), "Expected Instance for key score. Found int");
    }

    #[test]
    fn test_error_report_display_with_location() {
        let report = Error::Compile {
            message: "expected ';'".to_string(),
            file: None,
            line: Some(10),
            column: Some(5),
        }
        .to_report();

        let display = format!("{}", report);
        assert!(display.contains("[10:5]"));
        assert!(display.contains("compiler"));
        assert!(display.contains("expected ';'"));
    }

    #[test]
    fn test_error_report_display_without_location() {
        let report = Error::NoEntryPoint.to_report();
        assert_eq!(report.phase, "api");
        assert_eq!(report.error_kind, "NoEntryPoint");
        assert!(format!("{}", report).starts_with("[api] NoEntryPoint error"));
    }

    #[test]
    fn test_error_report_to_json() {
        let report = Error::Runtime {
            message: "bad \"quote\"".to_string(),
            file: None,
            line: Some(1),
        }
        .to_report();

        let json: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(json["phase"], "runtime");
        assert_eq!(json["line"], 1);
        assert_eq!(json["column"], serde_json::Value::Null);
        assert_eq!(json["error_kind"], "RuntimeError");
        assert_eq!(json["message"], "bad \"quote\"");
        assert!(json.get("file").is_none());
    }

    #[test]
    fn test_error_report_to_short() {
        let report = Error::host("boom").to_report();
        assert_eq!(report.to_short(), "runtime: boom");
    }
}
