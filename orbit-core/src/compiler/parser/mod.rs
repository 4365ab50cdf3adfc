pub mod error;
pub mod expr;
pub mod parser;
pub mod stmt;
mod utils;

// 重新导出常用类型
pub use error::{ErrorLocation, ParseResult, ParserError, ParserErrorKind};
pub use expr::{BinaryOp, Expr, ExprKind, FuncDecl, UnaryOp};
pub use parser::{parse, Parser};
pub use stmt::{ClassDecl, ClassVar, ExternKind, Module, Pos, Stmt, StmtKind};
