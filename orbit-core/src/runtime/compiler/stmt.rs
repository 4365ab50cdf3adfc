//! 语句编译

use super::context::{ClassScope, FunctionType, LoopState};
use super::error::{CompileError, CompileErrorKind};
use super::{expr, extern_kind_name, var, CodeGen};
use crate::compiler::parser::{ClassDecl, Expr, ExprKind, FuncDecl, Stmt, StmtKind};
use crate::runtime::bytecode::{ClassProto, Constant, OpCode, IVAR_INITIALIZER};
use std::rc::Rc;
use tracing::trace;

/// 编译语句
pub fn compile_stmt(cg: &mut CodeGen, stmt: &Stmt) -> Result<(), CompileError> {
    cg.set_pos(stmt.pos);
    match &stmt.kind {
        StmtKind::Expr(e) => {
            expr::compile_expr(cg, e)?;
            // 表达式语句的结果丢弃
            cg.emit(OpCode::Pop);
        }

        StmtKind::VarDecl { name, initializer } => {
            match initializer {
                Some(init) => expr::compile_expr(cg, init)?,
                None => {
                    cg.emit(OpCode::Null);
                }
            }
            cg.set_pos(stmt.pos);
            define_variable(cg, name)?;
        }

        StmtKind::FuncDecl(decl) => compile_func_decl(cg, decl)?,

        StmtKind::ClassDecl(decl) => compile_class(cg, decl)?,

        StmtKind::Extern { name, kind } => {
            trace!(target: "orbit::compiler", name = %name, kind = extern_kind_name(*kind), "extern declaration");
        }

        // include 在编译前已经展开
        StmtKind::Include(_) => {}

        StmtKind::Block(statements) => {
            var::begin_scope(cg.state_mut());
            for s in statements {
                compile_stmt(cg, s)?;
            }
            cg.end_scope();
        }

        StmtKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            expr::compile_expr(cg, condition)?;
            let then_jump = cg.emit_jump(OpCode::JumpIfFalse(usize::MAX));
            compile_scoped(cg, then_branch)?;
            match else_branch {
                Some(else_branch) => {
                    let else_jump = cg.emit_jump(OpCode::Jump(usize::MAX));
                    cg.patch_jump(then_jump);
                    compile_scoped(cg, else_branch)?;
                    cg.patch_jump(else_jump);
                }
                None => cg.patch_jump(then_jump),
            }
        }

        StmtKind::While { condition, body } => {
            let start = cg.state().chunk.code.len();
            expr::compile_expr(cg, condition)?;
            let exit = cg.emit_jump(OpCode::JumpIfFalse(usize::MAX));

            let depth = cg.state().scope_depth;
            cg.state_mut().loops.push(LoopState {
                start,
                depth,
                breaks: Vec::new(),
            });
            compile_scoped(cg, body)?;
            cg.emit(OpCode::Jump(start));
            cg.patch_jump(exit);
            finish_loop(cg);
        }

        StmtKind::For {
            variable,
            iterable,
            body,
        } => compile_for(cg, variable, iterable, body)?,

        StmtKind::Return(value) => {
            match value {
                Some(v) => expr::compile_expr(cg, v)?,
                None => {
                    cg.emit(OpCode::Null);
                }
            }
            cg.emit(OpCode::Return);
        }

        StmtKind::Break => {
            let depth = match cg.state().loops.last() {
                Some(l) => l.depth,
                None => return Err(cg.error(CompileErrorKind::OutsideLoop("break"))),
            };
            pop_loop_locals(cg, depth);
            let jump = cg.emit_jump(OpCode::Jump(usize::MAX));
            if let Some(l) = cg.state_mut().loops.last_mut() {
                l.breaks.push(jump);
            }
        }

        StmtKind::Continue => {
            let (depth, start) = match cg.state().loops.last() {
                Some(l) => (l.depth, l.start),
                None => return Err(cg.error(CompileErrorKind::OutsideLoop("continue"))),
            };
            pop_loop_locals(cg, depth);
            cg.emit(OpCode::Jump(start));
        }

        StmtKind::Throw(value) => {
            expr::compile_expr(cg, value)?;
            cg.set_pos(stmt.pos);
            cg.emit(OpCode::Throw);
        }

        StmtKind::Empty => {}
    }
    Ok(())
}

/// 控制流分支单独成一个作用域
fn compile_scoped(cg: &mut CodeGen, stmt: &Stmt) -> Result<(), CompileError> {
    var::begin_scope(cg.state_mut());
    compile_stmt(cg, stmt)?;
    cg.end_scope();
    Ok(())
}

/// 栈顶的值绑定到新变量：顶层为全局变量，否则为局部变量
fn define_variable(cg: &mut CodeGen, name: &str) -> Result<(), CompileError> {
    if cg.at_global_scope() {
        let idx = cg.name_constant(name)?;
        cg.emit(OpCode::DefineGlobal(idx));
        return Ok(());
    }

    let slot = cg.add_local(name)?;
    let boxed = cg.state().boxed;
    var::mark_initialized(cg.state_mut(), boxed);
    if boxed {
        cg.emit(OpCode::BoxLocal(slot));
    }
    Ok(())
}

fn compile_func_decl(cg: &mut CodeGen, decl: &Rc<FuncDecl>) -> Result<(), CompileError> {
    if cg.at_global_scope() {
        let proto = cg.compile_function(decl, FunctionType::Function)?;
        cg.set_pos(decl.pos);
        let idx = cg.make_constant(Constant::Function(proto))?;
        cg.emit(OpCode::Closure(idx));
        let name = cg.name_constant(&decl.name)?;
        cg.emit(OpCode::DefineGlobal(name));
        return Ok(());
    }

    // 局部函数：先占位，函数体内可以递归引用自己
    cg.emit(OpCode::Null);
    let slot = cg.add_local(&decl.name)?;
    let boxed = cg.state().boxed;
    var::mark_initialized(cg.state_mut(), boxed);
    if boxed {
        cg.emit(OpCode::BoxLocal(slot));
    }

    let proto = cg.compile_function(decl, FunctionType::Function)?;
    cg.set_pos(decl.pos);
    let idx = cg.make_constant(Constant::Function(proto))?;
    cg.emit(OpCode::Closure(idx));
    if boxed {
        cg.emit(OpCode::SetBoxed(slot));
    } else {
        cg.emit(OpCode::SetLocal(slot));
    }
    cg.emit(OpCode::Pop);
    Ok(())
}

fn compile_class(cg: &mut CodeGen, decl: &Rc<ClassDecl>) -> Result<(), CompileError> {
    if let Some(superclass) = &decl.superclass {
        if superclass == &decl.name {
            return Err(cg.error(CompileErrorKind::InheritsFromSelf(decl.name.clone())));
        }
        if !cg.globals.contains(superclass) {
            return Err(cg.error(CompileErrorKind::UnknownSuperclass(superclass.clone())));
        }
        let idx = cg.name_constant(superclass)?;
        cg.emit(OpCode::GetGlobal(idx));
    }

    let members = cg.classes.get(&decl.name).cloned().unwrap_or_default();
    let previous = cg.class_scope.replace(ClassScope {
        name: decl.name.clone(),
        members,
    });

    let compiled = compile_class_body(cg, decl);
    cg.class_scope = previous;
    let proto = compiled?;

    cg.set_pos(decl.pos);
    let idx = cg.make_constant(Constant::Class(Rc::new(proto)))?;
    cg.emit(OpCode::Class(idx));
    let name = cg.name_constant(&decl.name)?;
    cg.emit(OpCode::DefineGlobal(name));
    Ok(())
}

fn compile_class_body(cg: &mut CodeGen, decl: &ClassDecl) -> Result<ClassProto, CompileError> {
    let mut methods = Vec::with_capacity(decl.methods.len());
    for method in &decl.methods {
        methods.push(cg.compile_function(method, FunctionType::Method)?);
    }

    // 带初始值的实例变量合成为 `$init` 方法：self.name = initializer
    let assignments: Vec<Stmt> = decl
        .vars
        .iter()
        .filter_map(|v| {
            let value = v.initializer.clone()?;
            let target = Expr::new(
                ExprKind::Member {
                    object: Box::new(Expr::new(ExprKind::SelfRef, v.pos)),
                    member: v.name.clone(),
                },
                v.pos,
            );
            let assign = Expr::new(
                ExprKind::Assign {
                    target: Box::new(target),
                    value: Box::new(value),
                },
                v.pos,
            );
            Some(Stmt::new(StmtKind::Expr(assign), v.pos))
        })
        .collect();

    let initializer = if assignments.is_empty() {
        None
    } else {
        let init = FuncDecl {
            name: IVAR_INITIALIZER.to_string(),
            params: Vec::new(),
            body: assignments,
            pos: decl.pos,
        };
        Some(cg.compile_function(&init, FunctionType::Method)?)
    };

    trace!(
        target: "orbit::compiler",
        class = %decl.name,
        ivars = decl.vars.len(),
        methods = methods.len(),
        "Compiled class"
    );

    Ok(ClassProto {
        name: Rc::from(decl.name.as_str()),
        has_super: decl.superclass.is_some(),
        ivars: decl.vars.iter().map(|v| Rc::from(v.name.as_str())).collect(),
        methods,
        initializer,
    })
}

/// for (x in iterable) body
///
/// 栈布局：`seq`（被迭代对象）、`seq + 1`（下标）、`seq + 2`（循环变量，每轮新作用域）
fn compile_for(cg: &mut CodeGen, variable: &str, iterable: &Expr, body: &Stmt) -> Result<(), CompileError> {
    let pos = cg.state().pos;
    var::begin_scope(cg.state_mut());

    expr::compile_expr(cg, iterable)?;
    cg.set_pos(pos);
    let seq = cg.add_local(" seq")?;
    var::mark_initialized(cg.state_mut(), false);
    let zero = cg.make_constant(Constant::Int(0))?;
    cg.emit(OpCode::Constant(zero));
    cg.add_local(" index")?;
    var::mark_initialized(cg.state_mut(), false);

    let start = cg.emit_jump(OpCode::ForIter {
        seq,
        exit: usize::MAX,
    });
    let depth = cg.state().scope_depth;
    cg.state_mut().loops.push(LoopState {
        start,
        depth,
        breaks: Vec::new(),
    });

    var::begin_scope(cg.state_mut());
    let slot = cg.add_local(variable)?;
    let boxed = cg.state().boxed;
    var::mark_initialized(cg.state_mut(), boxed);
    if boxed {
        cg.emit(OpCode::BoxLocal(slot));
    }
    compile_stmt(cg, body)?;
    cg.end_scope();
    cg.emit(OpCode::Jump(start));

    cg.patch_jump(start);
    finish_loop(cg);
    cg.end_scope();
    Ok(())
}

/// 回填 break 跳转到当前位置
fn finish_loop(cg: &mut CodeGen) {
    if let Some(l) = cg.state_mut().loops.pop() {
        for jump in l.breaks {
            cg.patch_jump(jump);
        }
    }
}

/// break/continue 前弹出循环体内的局部变量（不改变编译期的变量表）
fn pop_loop_locals(cg: &mut CodeGen, depth: usize) {
    let count = var::locals_above(cg.state(), depth);
    for _ in 0..count {
        cg.emit(OpCode::Pop);
    }
}
