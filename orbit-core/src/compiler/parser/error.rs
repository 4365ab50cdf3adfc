use super::stmt::Pos;
use crate::kit::lexer::LexError;
use thiserror::Error;

pub type ParseResult<T> = Result<T, ParserError>;

/// 语法错误，包含位置信息
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}")]
pub struct ParserError {
    /// 错误类型
    pub kind: ParserErrorKind,
    /// 错误发生的位置
    pub location: ErrorLocation,
}

/// 错误位置信息
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorLocation {
    /// 特定位置
    At(Pos),
    /// 文件末尾
    Eof { file_id: u32 },
}

/// 语法错误类型
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParserErrorKind {
    #[error("{0}")]
    Lex(String),

    #[error("Unexpected token '{found}', expected {expected}")]
    UnexpectedToken { found: String, expected: String },

    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEndOfInput { expected: String },

    #[error("Invalid number format: '{0}'")]
    InvalidNumberFormat(String),

    #[error("Invalid assignment target")]
    InvalidAssignmentTarget,

    #[error("{0} is only allowed at the top level")]
    TopLevelOnly(&'static str),

    #[error("Too many {0} (limit is 255)")]
    TooMany(&'static str),
}

impl ParserError {
    pub fn at(kind: ParserErrorKind, pos: Pos) -> Self {
        Self {
            kind,
            location: ErrorLocation::At(pos),
        }
    }

    pub fn from_lex(err: &LexError, file_id: u32) -> Self {
        Self::at(
            ParserErrorKind::Lex(err.message.clone()),
            Pos {
                file_id,
                line: err.position.line as u32,
                column: err.position.column as u32,
            },
        )
    }

    /// 行号（文件末尾时为 None）
    pub fn line(&self) -> Option<u32> {
        match self.location {
            ErrorLocation::At(pos) => Some(pos.line),
            ErrorLocation::Eof { .. } => None,
        }
    }

    /// 列号（文件末尾时为 None）
    pub fn column(&self) -> Option<u32> {
        match self.location {
            ErrorLocation::At(pos) => Some(pos.column),
            ErrorLocation::Eof { .. } => None,
        }
    }

    pub fn file_id(&self) -> u32 {
        match self.location {
            ErrorLocation::At(pos) => pos.file_id,
            ErrorLocation::Eof { file_id } => file_id,
        }
    }
}
