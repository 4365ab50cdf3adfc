//! 词法分析入口

use super::orbit::OrbitScanner;
use super::scanner::{LexError, ScanResult, Token};
use super::stream::CharStream;
use crate::compiler::lexer::token_kind::OrbitTokenKind;

/// 词法分析器：把整段源码转换为 token 序列
pub struct Lexer<'a> {
    stream: CharStream<'a>,
    scanner: OrbitScanner,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            stream: CharStream::new(source),
            scanner: OrbitScanner::new(),
        }
    }

    /// 读取全部 token，遇到第一个错误即停止
    pub fn tokenize(mut self) -> Result<Vec<Token<OrbitTokenKind>>, LexError> {
        let mut tokens = Vec::new();
        loop {
            match self.scanner.next_token(&mut self.stream) {
                ScanResult::Token(token) => tokens.push(token),
                ScanResult::Eof => return Ok(tokens),
                ScanResult::Error(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_positions() {
        let tokens = Lexer::new("var a\n  = 1").tokenize().unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[2].span.start.line, 2);
        assert_eq!(tokens[2].span.start.column, 3);
        assert_eq!(tokens[3].text.as_deref(), Some("1"));
    }

    #[test]
    fn test_tokenize_error_position() {
        let err = Lexer::new("var a = #").tokenize().unwrap_err();
        assert_eq!(err.position.column, 9);
    }
}
