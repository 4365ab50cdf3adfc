use super::expr::{Expr, FuncDecl};
use std::rc::Rc;

/// 源码位置：文件 ID + 行列号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub file_id: u32,
    pub line: u32,
    pub column: u32,
}

/// 语句节点
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Pos,
}

impl Stmt {
    pub fn new(kind: StmtKind, pos: Pos) -> Self {
        Self { kind, pos }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    // 表达式语句
    Expr(Expr),
    // 变量声明 var x = e
    VarDecl {
        name: String,
        initializer: Option<Expr>,
    },
    // 具名函数声明
    FuncDecl(Rc<FuncDecl>),
    // 类声明
    ClassDecl(Rc<ClassDecl>),
    // extern var/func/class 声明：名字由宿主提供
    Extern { name: String, kind: ExternKind },
    // include "file"
    Include(String),
    // 代码块
    Block(Vec<Stmt>),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    // for (x in iterable)
    For {
        variable: String,
        iterable: Expr,
        body: Box<Stmt>,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    Throw(Expr),
    // 空语句
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternKind {
    Var,
    Func,
    Class,
}

/// 类声明
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub superclass: Option<String>,
    pub vars: Vec<ClassVar>,
    pub methods: Vec<Rc<FuncDecl>>,
    pub pos: Pos,
}

/// 类中的实例变量声明
#[derive(Debug, Clone, PartialEq)]
pub struct ClassVar {
    pub name: String,
    pub initializer: Option<Expr>,
    pub pos: Pos,
}

/// 一个源文件解析后的顶层语句集合
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub statements: Vec<Stmt>,
}
