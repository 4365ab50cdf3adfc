//! 编译错误

use crate::compiler::parser::Pos;
use thiserror::Error;

/// 代码生成阶段的错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub pos: Pos,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, pos: Pos) -> Self {
        Self { kind, pos }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileErrorKind {
    #[error("Undeclared identifier '{0}'")]
    UndeclaredIdentifier(String),

    #[error("Variable '{0}' already exists in this scope")]
    VariableAlreadyExists(String),

    #[error("Too many local variables in one function (limit is 256)")]
    TooManyLocals,

    #[error("Too many captured variables in one function (limit is 256)")]
    TooManyUpvalues,

    #[error("Too many constants in one function")]
    TooManyConstants,

    #[error("'self' can only be used inside a class method")]
    SelfOutsideMethod,

    #[error("'{0}' outside of a loop")]
    OutsideLoop(&'static str),

    #[error("Unknown superclass '{0}'")]
    UnknownSuperclass(String),

    #[error("Class '{0}' cannot inherit from itself")]
    InheritsFromSelf(String),
}
