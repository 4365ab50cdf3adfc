//! 通用工具：与具体语言无关的词法基础设施

pub mod lexer;
