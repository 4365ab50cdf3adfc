//! 宿主回调
//!
//! 编译器和虚拟机不直接访问宿主：错误上报、include 文件加载、
//! 原生函数调用都通过 [`Delegate`] 完成。每次调用都显式传入 delegate，
//! 引擎本身不保存任何宿主状态。

use super::heap::ObjRef;
use super::value::Value;
use super::vm::Vm;
use std::fmt;

/// 错误发生的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineErrorKind {
    /// 词法/语法错误
    Syntax,
    /// 语义错误（未声明的名字、数量超限等）
    Semantic,
    /// include 文件加载失败
    Io,
    /// 运行时错误
    Runtime,
}

impl EngineErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineErrorKind::Syntax => "syntax",
            EngineErrorKind::Semantic => "semantic",
            EngineErrorKind::Io => "io",
            EngineErrorKind::Runtime => "runtime",
        }
    }
}

/// 源码位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePosition {
    pub file_id: u32,
    pub line: u32,
    pub column: u32,
}

/// 引擎上报给宿主的错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
    pub position: Option<SourcePosition>,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            position: None,
        }
    }

    pub fn at(mut self, position: SourcePosition) -> Self {
        self.position = Some(position);
        self
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(p) => write!(
                f,
                "{} error at {}:{}: {}",
                self.kind.as_str(),
                p.line,
                p.column,
                self.message
            ),
            None => write!(f, "{} error: {}", self.kind.as_str(), self.message),
        }
    }
}

/// 加载成功的 include 文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    pub source: String,
    /// 宿主分配的文件 ID，同一文件多次 include 时必须返回相同 ID
    pub file_id: u32,
}

/// 宿主回调接口，所有方法都有空实现
pub trait Delegate {
    /// 编译或运行出错时调用
    fn report_error(&self, error: EngineError) {
        let _ = error;
    }

    /// 文件 ID → 文件名（用于诊断信息）
    fn filename(&self, file_id: u32) -> Option<String> {
        let _ = file_id;
        None
    }

    /// 加载 include 的文件，返回 None 表示无法读取
    fn load_file(&self, name: &str) -> Option<LoadedFile> {
        let _ = name;
        None
    }

    /// 调用宿主实现的函数
    ///
    /// `args[0]` 是接收者（调用普通函数时为 null），其余是脚本传入的实参。
    fn bridge_execute(&self, vm: &Vm, closure: ObjRef, args: &[Value]) -> Result<Value, String> {
        let _ = (vm, closure, args);
        Err("no host bridge installed".to_string())
    }
}

/// 什么都不做的 delegate
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDelegate;

impl Delegate for NullDelegate {}
