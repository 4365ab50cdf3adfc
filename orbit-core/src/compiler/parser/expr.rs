use super::stmt::{Pos, Stmt};
use std::rc::Rc;

/// 表达式节点（带源码位置）
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Pos,
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Pos) -> Self {
        Self { kind, pos }
    }

    /// 是否可以出现在赋值号左侧
    pub fn is_assignable(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::VarRef(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
        )
    }
}

/// 解析器表达式枚举
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    // 整数字面量
    LiteralInt(i64),
    // 浮点数字面量
    LiteralFloat(f64),
    // 字符串字面量
    LiteralString(String),
    LiteralTrue,
    LiteralFalse,
    LiteralNull,
    // 列表字面量 [a, b]
    LiteralList(Vec<Expr>),
    // Map 字面量 ["k": v]，空 map 写作 [:]
    LiteralMap(Vec<(Expr, Expr)>),
    // 区间 a...b / a..<b
    Range {
        from: Box<Expr>,
        to: Box<Expr>,
        inclusive: bool,
    },
    // 二元运算
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    // 短路逻辑运算，`and` 为 false 时表示 `||`
    Logical {
        left: Box<Expr>,
        and: bool,
        right: Box<Expr>,
    },
    // 一元运算
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    // 变量引用
    VarRef(String),
    // self
    SelfRef,
    // 赋值（目标为变量、成员或索引）
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    // 函数调用
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
    // 成员访问 obj.name
    Member {
        object: Box<Expr>,
        member: String,
    },
    // 索引访问 obj[index]
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    // 匿名函数 func (a) { ... }
    Lambda(Rc<FuncDecl>),
}

/// 二元运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

/// 一元运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// 函数声明（具名函数、方法与匿名函数共用）
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub pos: Pos,
}
