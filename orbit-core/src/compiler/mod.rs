//! 前端：token 定义与语法分析

pub mod lexer;
pub mod parser;
