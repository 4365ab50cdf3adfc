//! AST → Bytecode 编译器
//!
//! 单遍代码生成。每个函数对应一个 [`FunctionState`]，嵌套函数压栈编译，
//! upvalue 沿状态栈向外解析。顶层的 var/func/class 成为全局变量；
//! 未声明的名字在编译期报错。

pub mod context;
pub mod error;
pub mod expr;
pub mod stmt;
pub mod var;

pub use context::{ClassScope, FunctionState, FunctionType, Local, LoopState};
pub use error::{CompileError, CompileErrorKind};
pub use var::Variable;

use crate::compiler::parser::{ExprKind, Expr, FuncDecl, Pos, Stmt, StmtKind, ExternKind};
use crate::runtime::bytecode::{Constant, OpCode, Proto};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::trace;

/// 顶层入口函数的名字
pub const ENTRY_NAME: &str = "$main";

/// AST 编译器
pub struct CodeGen {
    pub(crate) states: Vec<FunctionState>,
    /// 程序中声明的全部全局名字（含 include 的文件与宿主预先声明的名字）
    pub(crate) globals: HashSet<String>,
    /// 程序中声明的类及其成员（含继承自脚本父类的）
    pub(crate) classes: HashMap<String, HashSet<String>>,
    pub(crate) class_scope: Option<ClassScope>,
    pub(crate) debug: bool,
}

impl CodeGen {
    pub fn new(debug: bool) -> Self {
        Self {
            states: Vec::new(),
            globals: HashSet::new(),
            classes: HashMap::new(),
            class_scope: None,
            debug,
        }
    }

    /// 声明一个由宿主提供的全局名字
    pub fn declare_global(&mut self, name: impl Into<String>) {
        self.globals.insert(name.into());
    }

    /// 编译整个程序（include 已展开），返回入口函数原型
    pub fn compile_program(&mut self, statements: &[Stmt], file_id: u32) -> Result<Rc<Proto>, CompileError> {
        self.collect_declarations(statements)?;

        let pos = Pos {
            file_id,
            line: 1,
            column: 1,
        };
        self.states.push(FunctionState::new(
            ENTRY_NAME,
            FunctionType::Script,
            pos,
            stmts_contain_closure(statements),
            self.debug,
        ));
        for stmt in statements {
            stmt::compile_stmt(self, stmt)?;
        }
        self.emit(OpCode::Null);
        self.emit(OpCode::Return);
        Ok(Rc::new(self.finish_function()))
    }

    /// 预扫描顶层声明：全局名字与类成员表
    fn collect_declarations(&mut self, statements: &[Stmt]) -> Result<(), CompileError> {
        let mut decls = HashMap::new();
        for stmt in statements {
            match &stmt.kind {
                StmtKind::VarDecl { name, .. } => {
                    self.globals.insert(name.clone());
                }
                StmtKind::FuncDecl(decl) => {
                    self.globals.insert(decl.name.clone());
                }
                StmtKind::Extern { name, .. } => {
                    self.globals.insert(name.clone());
                }
                StmtKind::ClassDecl(decl) => {
                    self.globals.insert(decl.name.clone());
                    decls.insert(decl.name.clone(), decl.clone());
                }
                _ => {}
            }
        }

        for (name, decl) in &decls {
            let mut members = HashSet::new();
            let mut current = Some(decl.clone());
            let mut seen = HashSet::new();
            while let Some(class) = current {
                if !seen.insert(class.name.clone()) {
                    return Err(CompileError::new(
                        CompileErrorKind::InheritsFromSelf(name.clone()),
                        decl.pos,
                    ));
                }
                members.extend(class.vars.iter().map(|v| v.name.clone()));
                members.extend(class.methods.iter().map(|m| m.name.clone()));
                current = class
                    .superclass
                    .as_ref()
                    .and_then(|s| decls.get(s).cloned());
            }
            self.classes.insert(name.clone(), members);
        }
        trace!(
            target: "orbit::compiler",
            globals = self.globals.len(),
            classes = self.classes.len(),
            "Collected top-level declarations"
        );
        Ok(())
    }

    // ==================== 函数状态 ====================

    pub(crate) fn state(&self) -> &FunctionState {
        let last = self.states.len() - 1;
        &self.states[last]
    }

    pub(crate) fn state_mut(&mut self) -> &mut FunctionState {
        let last = self.states.len() - 1;
        &mut self.states[last]
    }

    /// 弹出当前函数状态，生成函数原型
    fn finish_function(&mut self) -> Proto {
        let state = self.states.pop().unwrap_or_else(|| {
            FunctionState::new(ENTRY_NAME, FunctionType::Script, Pos::default(), false, self.debug)
        });
        trace!(
            target: "orbit::compiler",
            name = %state.name,
            ops = state.chunk.code.len(),
            constants = state.chunk.constants.len(),
            "Finished function"
        );
        Proto {
            name: Rc::from(state.name.as_str()),
            arity: state.arity,
            chunk: state.chunk,
            upvalues: state.upvalues,
            file_id: state.file_id,
        }
    }

    /// 编译函数体，返回原型
    pub(crate) fn compile_function(
        &mut self,
        decl: &FuncDecl,
        kind: FunctionType,
    ) -> Result<Rc<Proto>, CompileError> {
        let boxed = stmts_contain_closure(&decl.body);
        let mut state = FunctionState::new(&decl.name, kind, decl.pos, boxed, self.debug);
        state.arity = decl.params.len() as u8;
        self.states.push(state);

        for param in &decl.params {
            self.add_local(param)?;
            var::mark_initialized(self.state_mut(), boxed);
        }
        if boxed {
            let slots = self.state().locals.len();
            for slot in 0..slots {
                self.emit(OpCode::BoxLocal(slot as u8));
            }
            if let Some(slot0) = self.state_mut().locals.first_mut() {
                slot0.boxed = true;
            }
        }

        for stmt in &decl.body {
            stmt::compile_stmt(self, stmt)?;
        }
        self.emit(OpCode::Null);
        self.emit(OpCode::Return);
        Ok(Rc::new(self.finish_function()))
    }

    // ==================== 发射指令 ====================

    pub(crate) fn set_pos(&mut self, pos: Pos) {
        self.state_mut().pos = pos;
    }

    pub(crate) fn emit(&mut self, op: OpCode) -> usize {
        let state = self.state_mut();
        let Pos { file_id, line, .. } = state.pos;
        state.chunk.write(op, file_id, line)
    }

    /// 发射跳转指令，返回待回填的位置
    pub(crate) fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit(op)
    }

    /// 把跳转目标回填为当前位置
    pub(crate) fn patch_jump(&mut self, at: usize) {
        let target = self.state().chunk.code.len();
        self.state_mut().chunk.patch_jump(at, target);
    }

    pub(crate) fn make_constant(&mut self, constant: Constant) -> Result<u16, CompileError> {
        let pos = self.state().pos;
        self.state_mut()
            .chunk
            .add_constant(constant)
            .ok_or_else(|| CompileError::new(CompileErrorKind::TooManyConstants, pos))
    }

    pub(crate) fn name_constant(&mut self, name: &str) -> Result<u16, CompileError> {
        self.make_constant(Constant::Str(Rc::from(name)))
    }

    pub(crate) fn add_local(&mut self, name: &str) -> Result<u8, CompileError> {
        let pos = self.state().pos;
        var::add_local(self.state_mut(), name).map_err(|kind| CompileError::new(kind, pos))
    }

    pub(crate) fn error(&self, kind: CompileErrorKind) -> CompileError {
        CompileError::new(kind, self.state().pos)
    }

    /// 弹出作用域并为离开作用域的局部变量发射 Pop
    pub(crate) fn end_scope(&mut self) {
        let popped = var::end_scope(self.state_mut());
        for _ in 0..popped {
            self.emit(OpCode::Pop);
        }
    }

    /// 顶层作用域（声明成为全局变量）
    pub(crate) fn at_global_scope(&self) -> bool {
        let state = self.state();
        state.kind == FunctionType::Script && state.scope_depth == 0
    }
}

// ==================== 闭包扫描 ====================

/// 语句中是否出现匿名函数或局部函数声明（不进入嵌套函数内部）
pub(crate) fn stmts_contain_closure(statements: &[Stmt]) -> bool {
    statements.iter().any(stmt_contains_closure)
}

fn stmt_contains_closure(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::FuncDecl(_) => true,
        StmtKind::Expr(e) | StmtKind::Throw(e) => expr_contains_closure(e),
        StmtKind::VarDecl { initializer, .. } => initializer.as_ref().is_some_and(expr_contains_closure),
        StmtKind::Return(value) => value.as_ref().is_some_and(expr_contains_closure),
        StmtKind::Block(stmts) => stmts_contain_closure(stmts),
        StmtKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            expr_contains_closure(condition)
                || stmt_contains_closure(then_branch)
                || else_branch.as_deref().is_some_and(stmt_contains_closure)
        }
        StmtKind::While { condition, body } => {
            expr_contains_closure(condition) || stmt_contains_closure(body)
        }
        StmtKind::For { iterable, body, .. } => {
            expr_contains_closure(iterable) || stmt_contains_closure(body)
        }
        StmtKind::ClassDecl(_)
        | StmtKind::Extern { .. }
        | StmtKind::Include(_)
        | StmtKind::Break
        | StmtKind::Continue
        | StmtKind::Empty => false,
    }
}

fn expr_contains_closure(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Lambda(_) => true,
        ExprKind::LiteralList(items) => items.iter().any(expr_contains_closure),
        ExprKind::LiteralMap(entries) => entries
            .iter()
            .any(|(k, v)| expr_contains_closure(k) || expr_contains_closure(v)),
        ExprKind::Range { from, to, .. } => expr_contains_closure(from) || expr_contains_closure(to),
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            expr_contains_closure(left) || expr_contains_closure(right)
        }
        ExprKind::Unary { operand, .. } => expr_contains_closure(operand),
        ExprKind::Assign { target, value } => expr_contains_closure(target) || expr_contains_closure(value),
        ExprKind::Call { callee, arguments } => {
            expr_contains_closure(callee) || arguments.iter().any(expr_contains_closure)
        }
        ExprKind::Member { object, .. } => expr_contains_closure(object),
        ExprKind::Index { object, index } => expr_contains_closure(object) || expr_contains_closure(index),
        ExprKind::LiteralInt(_)
        | ExprKind::LiteralFloat(_)
        | ExprKind::LiteralString(_)
        | ExprKind::LiteralTrue
        | ExprKind::LiteralFalse
        | ExprKind::LiteralNull
        | ExprKind::VarRef(_)
        | ExprKind::SelfRef => false,
    }
}

/// extern 声明的种类名（用于日志）
pub(crate) fn extern_kind_name(kind: ExternKind) -> &'static str {
    match kind {
        ExternKind::Var => "var",
        ExternKind::Func => "func",
        ExternKind::Class => "class",
    }
}
