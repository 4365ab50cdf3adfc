//! Orbit Lexer
//!
//! 一次性把源码切分为 token 序列：
//! - 精准位置追踪（行/列，1-based）
//! - 统一的错误类型，携带出错位置

pub mod lexer;
pub mod orbit;
pub mod position;
pub mod scanner;
pub mod stream;

pub use lexer::Lexer;
pub use orbit::OrbitScanner;
pub use position::{SourcePosition, SourceSpan};
pub use scanner::{ErrorKind, LexError, ScanResult, Token};
pub use stream::CharStream;
