//! Orbit Token 类型定义

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[repr(u8)]
pub enum OrbitTokenKind {
    // 关键字
    Var = 0,
    Func,
    Class,
    Extern,
    Include,
    If,
    Else,
    While,
    For,
    In,
    Return,
    Break,
    Continue,
    Throw,
    True,
    False,
    Null,
    SelfKw,

    // 字面量 (100-102)
    LiteralInteger = 100,
    LiteralString,
    LiteralFloat,

    // 标识符 (120)
    Identifier = 120,

    // 多字符符号 (130-)
    DoubleEqual = 130,
    ExclamationEqual,
    GreaterThanEqual,
    LessThanEqual,
    AndAnd,
    OrOr,
    DotDotDot,
    DotDotLess,

    // 单字符符号 (150-)
    GreaterThan = 150,
    LessThan,
    Plus,
    Minus,
    Asterisk,
    Slash,
    Percent,
    Colon,
    Equal,
    Comma,
    Semicolon,
    LeftParenthesis,
    RightParenthesis,
    LeftCurlyBrace,
    RightCurlyBrace,
    LeftSquareBracket,
    RightSquareBracket,
    Dot,
    Exclamation,
}

impl OrbitTokenKind {
    /// 源码中的写法，用于错误信息
    pub fn as_str(&self) -> &'static str {
        use OrbitTokenKind::*;
        match self {
            Var => "var",
            Func => "func",
            Class => "class",
            Extern => "extern",
            Include => "include",
            If => "if",
            Else => "else",
            While => "while",
            For => "for",
            In => "in",
            Return => "return",
            Break => "break",
            Continue => "continue",
            Throw => "throw",
            True => "true",
            False => "false",
            Null => "null",
            SelfKw => "self",
            LiteralInteger => "integer",
            LiteralString => "string",
            LiteralFloat => "float",
            Identifier => "identifier",
            DoubleEqual => "==",
            ExclamationEqual => "!=",
            GreaterThanEqual => ">=",
            LessThanEqual => "<=",
            AndAnd => "&&",
            OrOr => "||",
            DotDotDot => "...",
            DotDotLess => "..<",
            GreaterThan => ">",
            LessThan => "<",
            Plus => "+",
            Minus => "-",
            Asterisk => "*",
            Slash => "/",
            Percent => "%",
            Colon => ":",
            Equal => "=",
            Comma => ",",
            Semicolon => ";",
            LeftParenthesis => "(",
            RightParenthesis => ")",
            LeftCurlyBrace => "{",
            RightCurlyBrace => "}",
            LeftSquareBracket => "[",
            RightSquareBracket => "]",
            Dot => ".",
            Exclamation => "!",
        }
    }
}

impl fmt::Display for OrbitTokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<OrbitTokenKind> for u8 {
    fn from(val: OrbitTokenKind) -> Self {
        val as u8
    }
}
