//! 字符流：在 `&str` 上按码点前进，并维护当前位置

use super::position::SourcePosition;

/// 字符流
#[derive(Debug, Clone)]
pub struct CharStream<'a> {
    source: &'a str,
    position: SourcePosition,
}

impl<'a> CharStream<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            position: SourcePosition::start(),
        }
    }

    /// 当前位置
    pub fn position(&self) -> SourcePosition {
        self.position
    }

    fn rest(&self) -> &'a str {
        &self.source[self.position.byte_offset..]
    }

    /// 预读第 n 个字符（0 为当前字符）
    pub fn peek(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    /// 消费一个字符
    pub fn advance(&mut self) -> Option<char> {
        let c = self.rest().chars().next()?;
        self.position.advance(c);
        Some(c)
    }

    /// 当前字符是否为 `expected`
    pub fn check(&self, expected: char) -> bool {
        self.peek(0) == Some(expected)
    }

    /// 若当前字符为 `expected` 则消费
    pub fn match_char(&mut self, expected: char) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn is_eof(&self) -> bool {
        self.position.byte_offset >= self.source.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_and_advance() {
        let mut stream = CharStream::new("ab");
        assert_eq!(stream.peek(0), Some('a'));
        assert_eq!(stream.peek(1), Some('b'));
        assert_eq!(stream.peek(2), None);
        assert_eq!(stream.advance(), Some('a'));
        assert!(stream.match_char('b'));
        assert!(stream.is_eof());
        assert_eq!(stream.advance(), None);
    }
}
