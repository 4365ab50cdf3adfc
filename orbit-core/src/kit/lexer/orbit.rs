//! Orbit 语言 Scanner 实现
//!
//! 支持：
//! - 关键字、标识符
//! - 运算符（单字符和多字符，包括 `...` 与 `..<`）
//! - 整数、浮点数、字符串
//! - 行注释与块注释

use super::position::{SourcePosition, SourceSpan};
use super::scanner::{is_identifier_continue, is_identifier_start, ErrorKind, LexError, ScanResult, Token};
use super::stream::CharStream;
use crate::compiler::lexer::token_kind::OrbitTokenKind;

use tracing::trace;

const KEYWORD_TABLE: [(&str, OrbitTokenKind); 18] = [
    ("var", OrbitTokenKind::Var),
    ("func", OrbitTokenKind::Func),
    ("class", OrbitTokenKind::Class),
    ("extern", OrbitTokenKind::Extern),
    ("include", OrbitTokenKind::Include),
    ("if", OrbitTokenKind::If),
    ("else", OrbitTokenKind::Else),
    ("while", OrbitTokenKind::While),
    ("for", OrbitTokenKind::For),
    ("in", OrbitTokenKind::In),
    ("return", OrbitTokenKind::Return),
    ("break", OrbitTokenKind::Break),
    ("continue", OrbitTokenKind::Continue),
    ("throw", OrbitTokenKind::Throw),
    ("true", OrbitTokenKind::True),
    ("false", OrbitTokenKind::False),
    ("null", OrbitTokenKind::Null),
    ("self", OrbitTokenKind::SelfKw),
];

type ScanToken = ScanResult<Token<OrbitTokenKind>>;

/// Orbit 扫描器
pub struct OrbitScanner {
    /// 当前 token 的起始位置（用于构建 span）
    token_start: SourcePosition,
}

impl Default for OrbitScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl OrbitScanner {
    pub fn new() -> Self {
        Self {
            token_start: SourcePosition::start(),
        }
    }

    /// 扫描下一个 token
    pub fn next_token(&mut self, stream: &mut CharStream) -> ScanToken {
        // 跳过空白符和注释
        if let Err(err) = self.skip_whitespace_and_comments(stream) {
            return ScanResult::Error(err);
        }

        self.token_start = stream.position();
        let Some(c) = stream.peek(0) else {
            return ScanResult::Eof;
        };

        trace!(target: "orbit::lexer",
            line = self.token_start.line,
            column = self.token_start.column,
            "Starting token scan"
        );

        match c {
            '+' => self.single(stream, OrbitTokenKind::Plus),
            '-' => self.single(stream, OrbitTokenKind::Minus),
            '*' => self.single(stream, OrbitTokenKind::Asterisk),
            '/' => self.single(stream, OrbitTokenKind::Slash),
            '%' => self.single(stream, OrbitTokenKind::Percent),
            '(' => self.single(stream, OrbitTokenKind::LeftParenthesis),
            ')' => self.single(stream, OrbitTokenKind::RightParenthesis),
            '{' => self.single(stream, OrbitTokenKind::LeftCurlyBrace),
            '}' => self.single(stream, OrbitTokenKind::RightCurlyBrace),
            '[' => self.single(stream, OrbitTokenKind::LeftSquareBracket),
            ']' => self.single(stream, OrbitTokenKind::RightSquareBracket),
            ';' => self.single(stream, OrbitTokenKind::Semicolon),
            ',' => self.single(stream, OrbitTokenKind::Comma),
            ':' => self.single(stream, OrbitTokenKind::Colon),

            '.' => self.scan_dot(stream),
            '=' => self.either(stream, '=', OrbitTokenKind::DoubleEqual, OrbitTokenKind::Equal),
            '!' => self.either(
                stream,
                '=',
                OrbitTokenKind::ExclamationEqual,
                OrbitTokenKind::Exclamation,
            ),
            '<' => self.either(stream, '=', OrbitTokenKind::LessThanEqual, OrbitTokenKind::LessThan),
            '>' => self.either(
                stream,
                '=',
                OrbitTokenKind::GreaterThanEqual,
                OrbitTokenKind::GreaterThan,
            ),
            '&' => self.pair(stream, '&', OrbitTokenKind::AndAnd),
            '|' => self.pair(stream, '|', OrbitTokenKind::OrOr),

            '"' | '\'' => self.scan_string(stream, c),
            '0'..='9' => self.scan_number(stream),
            c if is_identifier_start(c) => self.scan_identifier_or_keyword(stream),

            _ => {
                stream.advance();
                self.error(ErrorKind::InvalidChar(c), format!("Unexpected character '{c}'"))
            }
        }
    }

    fn span(&self, stream: &CharStream) -> SourceSpan {
        SourceSpan::range(self.token_start, stream.position())
    }

    fn error(&self, kind: ErrorKind, message: String) -> ScanToken {
        ScanResult::Error(LexError {
            kind,
            position: self.token_start,
            message,
        })
    }

    /// 创建单字符 token
    fn single(&mut self, stream: &mut CharStream, kind: OrbitTokenKind) -> ScanToken {
        stream.advance();
        ScanResult::Token(Token::new(kind, self.span(stream)))
    }

    /// `c` 后跟 `second` 时为 `double`，否则为 `single`
    fn either(
        &mut self,
        stream: &mut CharStream,
        second: char,
        double: OrbitTokenKind,
        single: OrbitTokenKind,
    ) -> ScanToken {
        stream.advance();
        let kind = if stream.match_char(second) { double } else { single };
        ScanResult::Token(Token::new(kind, self.span(stream)))
    }

    /// 只能成对出现的符号（`&&`、`||`）
    fn pair(&mut self, stream: &mut CharStream, second: char, kind: OrbitTokenKind) -> ScanToken {
        let Some(first) = stream.advance() else {
            return ScanResult::Eof;
        };
        if stream.match_char(second) {
            ScanResult::Token(Token::new(kind, self.span(stream)))
        } else {
            self.error(
                ErrorKind::InvalidChar(first),
                format!("Unexpected character '{first}', did you mean '{kind}'?"),
            )
        }
    }

    /// 扫描 '.' 系列（`.`、`...`、`..<`）
    fn scan_dot(&mut self, stream: &mut CharStream) -> ScanToken {
        stream.advance();
        if !stream.check('.') {
            return ScanResult::Token(Token::new(OrbitTokenKind::Dot, self.span(stream)));
        }
        stream.advance();
        if stream.match_char('.') {
            ScanResult::Token(Token::new(OrbitTokenKind::DotDotDot, self.span(stream)))
        } else if stream.match_char('<') {
            ScanResult::Token(Token::new(OrbitTokenKind::DotDotLess, self.span(stream)))
        } else {
            self.error(
                ErrorKind::InvalidChar('.'),
                "Unexpected '..', did you mean '...' or '..<'?".to_string(),
            )
        }
    }

    /// 跳过空白符和注释
    fn skip_whitespace_and_comments(&mut self, stream: &mut CharStream) -> Result<(), LexError> {
        loop {
            match (stream.peek(0), stream.peek(1)) {
                (Some(c), _) if c.is_whitespace() => {
                    stream.advance();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = stream.peek(0) {
                        if c == '\n' {
                            break;
                        }
                        stream.advance();
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = stream.position();
                    stream.advance();
                    stream.advance();
                    loop {
                        match stream.advance() {
                            Some('*') if stream.check('/') => {
                                stream.advance();
                                break;
                            }
                            Some(_) => {}
                            None => {
                                return Err(LexError {
                                    kind: ErrorKind::UnterminatedComment,
                                    position: start,
                                    message: "Unterminated block comment".to_string(),
                                })
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// 扫描字符串
    fn scan_string(&mut self, stream: &mut CharStream, quote: char) -> ScanToken {
        stream.advance(); // 消费开头的引号
        let mut value = String::new();

        loop {
            match stream.advance() {
                Some(c) if c == quote => {
                    return ScanResult::Token(Token::with_text(
                        OrbitTokenKind::LiteralString,
                        self.span(stream),
                        value,
                    ));
                }
                Some('\\') => match stream.advance() {
                    Some(c) => value.push(parse_escape(c)),
                    None => break,
                },
                Some(c) => value.push(c),
                None => break,
            }
        }

        self.error(
            ErrorKind::UnterminatedString,
            "Unterminated string literal".to_string(),
        )
    }

    /// 扫描数字（整数或浮点数）
    fn scan_number(&mut self, stream: &mut CharStream) -> ScanToken {
        let mut value = String::new();
        let mut is_float = false;

        while let Some(c) = stream.peek(0).filter(char::is_ascii_digit) {
            value.push(c);
            stream.advance();
        }

        // 小数点后必须跟数字，否则是 `1...5` 这样的区间
        if stream.check('.') && stream.peek(1).is_some_and(|c| c.is_ascii_digit()) {
            stream.advance();
            value.push('.');
            is_float = true;
            while let Some(c) = stream.peek(0).filter(char::is_ascii_digit) {
                value.push(c);
                stream.advance();
            }
        }

        if !is_float && value.parse::<i64>().is_err() {
            return self.error(
                ErrorKind::InvalidNumber(value.clone()),
                format!("Integer literal '{value}' is out of range"),
            );
        }

        let kind = if is_float {
            OrbitTokenKind::LiteralFloat
        } else {
            OrbitTokenKind::LiteralInteger
        };
        ScanResult::Token(Token::with_text(kind, self.span(stream), value))
    }

    /// 扫描标识符或关键字
    fn scan_identifier_or_keyword(&mut self, stream: &mut CharStream) -> ScanToken {
        let mut text = String::new();
        while let Some(c) = stream.peek(0).filter(|c| is_identifier_continue(*c)) {
            text.push(c);
            stream.advance();
        }

        match KEYWORD_TABLE.iter().find(|(kw, _)| *kw == text) {
            Some((_, kind)) => ScanResult::Token(Token::new(*kind, self.span(stream))),
            None => ScanResult::Token(Token::with_text(
                OrbitTokenKind::Identifier,
                self.span(stream),
                text,
            )),
        }
    }
}

/// 解析转义字符
fn parse_escape(c: char) -> char {
    match c {
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        '0' => '\0',
        _ => c, // 未知转义保留原样
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<OrbitTokenKind> {
        let mut stream = CharStream::new(source);
        let mut scanner = OrbitScanner::new();
        let mut out = Vec::new();
        loop {
            match scanner.next_token(&mut stream) {
                ScanResult::Token(t) => out.push(t.kind),
                ScanResult::Eof => break,
                ScanResult::Error(e) => panic!("lex error: {e}"),
            }
        }
        out
    }

    #[test]
    fn test_keywords_and_identifiers() {
        use OrbitTokenKind::*;
        assert_eq!(
            kinds("extern func doSomething; var self_ = self"),
            vec![Extern, Func, Identifier, Semicolon, Var, Identifier, Equal, SelfKw]
        );
    }

    #[test]
    fn test_range_operators_after_integers() {
        use OrbitTokenKind::*;
        assert_eq!(kinds("1...5"), vec![LiteralInteger, DotDotDot, LiteralInteger]);
        assert_eq!(kinds("1..<5"), vec![LiteralInteger, DotDotLess, LiteralInteger]);
        assert_eq!(kinds("1.5"), vec![LiteralFloat]);
        assert_eq!(kinds("a.b"), vec![Identifier, Dot, Identifier]);
    }

    #[test]
    fn test_comments_are_skipped() {
        use OrbitTokenKind::*;
        assert_eq!(
            kinds("a // line\n /* block\n */ b"),
            vec![Identifier, Identifier]
        );
    }

    #[test]
    fn test_logical_operators() {
        use OrbitTokenKind::*;
        assert_eq!(kinds("!a && b || c != d"), vec![
            Exclamation, Identifier, AndAnd, Identifier, OrOr, Identifier, ExclamationEqual, Identifier
        ]);
    }

    #[test]
    fn test_string_escapes() {
        let mut stream = CharStream::new(r#""a\"b\n""#);
        let mut scanner = OrbitScanner::new();
        match scanner.next_token(&mut stream) {
            ScanResult::Token(t) => assert_eq!(t.text.as_deref(), Some("a\"b\n")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_string() {
        let mut stream = CharStream::new("\"abc");
        let mut scanner = OrbitScanner::new();
        assert!(matches!(
            scanner.next_token(&mut stream),
            ScanResult::Error(LexError {
                kind: ErrorKind::UnterminatedString,
                ..
            })
        ));
    }

    #[test]
    fn test_single_ampersand_is_error() {
        let mut stream = CharStream::new("a & b");
        let mut scanner = OrbitScanner::new();
        let _ = scanner.next_token(&mut stream);
        assert!(matches!(scanner.next_token(&mut stream), ScanResult::Error(_)));
    }
}
