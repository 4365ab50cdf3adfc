//! 表达式编译

use super::context::FunctionType;
use super::error::{CompileError, CompileErrorKind};
use super::var::{self, Variable};
use super::CodeGen;
use crate::compiler::parser::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::runtime::bytecode::{Constant, OpCode};
use std::rc::Rc;

/// 名字解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameRef {
    Var(Variable),
    /// 方法内省略了 `self.` 的成员访问
    Member,
    Global,
}

/// 编译表达式，结果留在栈顶
pub fn compile_expr(cg: &mut CodeGen, expr: &Expr) -> Result<(), CompileError> {
    cg.set_pos(expr.pos);
    match &expr.kind {
        ExprKind::LiteralInt(n) => emit_constant(cg, Constant::Int(*n))?,
        ExprKind::LiteralFloat(f) => emit_constant(cg, Constant::Float(*f))?,
        ExprKind::LiteralString(s) => emit_constant(cg, Constant::Str(Rc::from(s.as_str())))?,
        ExprKind::LiteralTrue => {
            cg.emit(OpCode::True);
        }
        ExprKind::LiteralFalse => {
            cg.emit(OpCode::False);
        }
        ExprKind::LiteralNull => {
            cg.emit(OpCode::Null);
        }

        ExprKind::LiteralList(items) => {
            for item in items {
                compile_expr(cg, item)?;
            }
            cg.set_pos(expr.pos);
            cg.emit(OpCode::BuildList(items.len() as u16));
        }

        ExprKind::LiteralMap(entries) => {
            for (key, value) in entries {
                compile_expr(cg, key)?;
                compile_expr(cg, value)?;
            }
            cg.set_pos(expr.pos);
            cg.emit(OpCode::BuildMap(entries.len() as u16));
        }

        ExprKind::Range { from, to, inclusive } => {
            compile_expr(cg, from)?;
            compile_expr(cg, to)?;
            cg.set_pos(expr.pos);
            cg.emit(OpCode::BuildRange {
                inclusive: *inclusive,
            });
        }

        ExprKind::Binary { left, op, right } => {
            compile_expr(cg, left)?;
            compile_expr(cg, right)?;
            cg.set_pos(expr.pos);
            cg.emit(binary_opcode(*op));
        }

        ExprKind::Logical { left, and, right } => {
            compile_expr(cg, left)?;
            let jump = if *and {
                cg.emit_jump(OpCode::JumpIfFalseOrPop(usize::MAX))
            } else {
                cg.emit_jump(OpCode::JumpIfTrueOrPop(usize::MAX))
            };
            compile_expr(cg, right)?;
            cg.patch_jump(jump);
        }

        ExprKind::Unary { op, operand } => {
            compile_expr(cg, operand)?;
            cg.set_pos(expr.pos);
            match op {
                UnaryOp::Neg => cg.emit(OpCode::Negate),
                UnaryOp::Not => cg.emit(OpCode::Not),
            };
        }

        ExprKind::VarRef(name) => match resolve_name(cg, name)? {
            NameRef::Var(v) => emit_get_variable(cg, v),
            NameRef::Member => {
                emit_self(cg)?;
                let idx = cg.name_constant(name)?;
                cg.emit(OpCode::GetProperty(idx));
            }
            NameRef::Global => {
                let idx = cg.name_constant(name)?;
                cg.emit(OpCode::GetGlobal(idx));
            }
        },

        ExprKind::SelfRef => emit_self(cg)?,

        ExprKind::Assign { target, value } => compile_assign(cg, target, value)?,

        ExprKind::Call { callee, arguments } => compile_call(cg, expr, callee, arguments)?,

        ExprKind::Member { object, member } => {
            compile_expr(cg, object)?;
            cg.set_pos(expr.pos);
            let idx = cg.name_constant(member)?;
            cg.emit(OpCode::GetProperty(idx));
        }

        ExprKind::Index { object, index } => {
            compile_expr(cg, object)?;
            compile_expr(cg, index)?;
            cg.set_pos(expr.pos);
            cg.emit(OpCode::GetIndex);
        }

        ExprKind::Lambda(decl) => {
            let proto = cg.compile_function(decl, FunctionType::Function)?;
            cg.set_pos(expr.pos);
            let idx = cg.make_constant(Constant::Function(proto))?;
            cg.emit(OpCode::Closure(idx));
        }
    }
    Ok(())
}

fn emit_constant(cg: &mut CodeGen, constant: Constant) -> Result<(), CompileError> {
    let idx = cg.make_constant(constant)?;
    cg.emit(OpCode::Constant(idx));
    Ok(())
}

fn binary_opcode(op: BinaryOp) -> OpCode {
    match op {
        BinaryOp::Add => OpCode::Add,
        BinaryOp::Sub => OpCode::Subtract,
        BinaryOp::Mul => OpCode::Multiply,
        BinaryOp::Div => OpCode::Divide,
        BinaryOp::Mod => OpCode::Modulo,
        BinaryOp::Equal => OpCode::Equal,
        BinaryOp::NotEqual => OpCode::NotEqual,
        BinaryOp::Less => OpCode::Less,
        BinaryOp::LessEqual => OpCode::LessEqual,
        BinaryOp::Greater => OpCode::Greater,
        BinaryOp::GreaterEqual => OpCode::GreaterEqual,
    }
}

/// 解析顺序：局部变量 → upvalue → 当前类成员 → 全局变量
fn resolve_name(cg: &mut CodeGen, name: &str) -> Result<NameRef, CompileError> {
    let pos = cg.state().pos;
    if let Some(v) = var::resolve_variable(&mut cg.states, name).map_err(|k| CompileError::new(k, pos))? {
        return Ok(NameRef::Var(v));
    }
    if cg
        .class_scope
        .as_ref()
        .is_some_and(|scope| scope.members.contains(name))
    {
        return Ok(NameRef::Member);
    }
    if cg.globals.contains(name) {
        return Ok(NameRef::Global);
    }
    Err(cg.error(CompileErrorKind::UndeclaredIdentifier(name.to_string())))
}

fn emit_get_variable(cg: &mut CodeGen, v: Variable) {
    match v {
        Variable::Local { slot, boxed: false } => cg.emit(OpCode::GetLocal(slot)),
        Variable::Local { slot, boxed: true } => cg.emit(OpCode::GetBoxed(slot)),
        Variable::Upvalue(i) => cg.emit(OpCode::GetUpvalue(i)),
    };
}

fn emit_set_variable(cg: &mut CodeGen, v: Variable) {
    match v {
        Variable::Local { slot, boxed: false } => cg.emit(OpCode::SetLocal(slot)),
        Variable::Local { slot, boxed: true } => cg.emit(OpCode::SetBoxed(slot)),
        Variable::Upvalue(i) => cg.emit(OpCode::SetUpvalue(i)),
    };
}

/// 加载 self（方法槽位 0，或闭包捕获的 self）
fn emit_self(cg: &mut CodeGen) -> Result<(), CompileError> {
    let pos = cg.state().pos;
    match var::resolve_variable(&mut cg.states, "self").map_err(|k| CompileError::new(k, pos))? {
        Some(v) => {
            emit_get_variable(cg, v);
            Ok(())
        }
        None => Err(cg.error(CompileErrorKind::SelfOutsideMethod)),
    }
}

fn compile_assign(cg: &mut CodeGen, target: &Expr, value: &Expr) -> Result<(), CompileError> {
    let pos = cg.state().pos;
    match &target.kind {
        ExprKind::VarRef(name) => match resolve_name(cg, name)? {
            NameRef::Var(v) => {
                compile_expr(cg, value)?;
                cg.set_pos(pos);
                emit_set_variable(cg, v);
            }
            NameRef::Member => {
                emit_self(cg)?;
                compile_expr(cg, value)?;
                cg.set_pos(pos);
                let idx = cg.name_constant(name)?;
                cg.emit(OpCode::SetProperty(idx));
            }
            NameRef::Global => {
                compile_expr(cg, value)?;
                cg.set_pos(pos);
                let idx = cg.name_constant(name)?;
                cg.emit(OpCode::SetGlobal(idx));
            }
        },
        ExprKind::Member { object, member } => {
            compile_expr(cg, object)?;
            compile_expr(cg, value)?;
            cg.set_pos(pos);
            let idx = cg.name_constant(member)?;
            cg.emit(OpCode::SetProperty(idx));
        }
        ExprKind::Index { object, index } => {
            compile_expr(cg, object)?;
            compile_expr(cg, index)?;
            compile_expr(cg, value)?;
            cg.set_pos(pos);
            cg.emit(OpCode::SetIndex);
        }
        // 解析器已保证赋值目标合法
        _ => {
            compile_expr(cg, value)?;
        }
    }
    Ok(())
}

/// 调用：`obj.m(args)` 与方法内的 `m(args)` 编译为 Invoke，其余为 Call
fn compile_call(cg: &mut CodeGen, call: &Expr, callee: &Expr, arguments: &[Expr]) -> Result<(), CompileError> {
    let argc = arguments.len() as u8;
    match &callee.kind {
        ExprKind::Member { object, member } => {
            compile_expr(cg, object)?;
            compile_arguments(cg, arguments)?;
            cg.set_pos(call.pos);
            let idx = cg.name_constant(member)?;
            cg.emit(OpCode::Invoke(idx, argc));
        }
        ExprKind::VarRef(name) => {
            cg.set_pos(callee.pos);
            match resolve_name(cg, name)? {
                NameRef::Member => {
                    emit_self(cg)?;
                    compile_arguments(cg, arguments)?;
                    cg.set_pos(call.pos);
                    let idx = cg.name_constant(name)?;
                    cg.emit(OpCode::Invoke(idx, argc));
                }
                resolved => {
                    match resolved {
                        NameRef::Var(v) => emit_get_variable(cg, v),
                        _ => {
                            let idx = cg.name_constant(name)?;
                            cg.emit(OpCode::GetGlobal(idx));
                        }
                    }
                    compile_arguments(cg, arguments)?;
                    cg.set_pos(call.pos);
                    cg.emit(OpCode::Call(argc));
                }
            }
        }
        _ => {
            compile_expr(cg, callee)?;
            compile_arguments(cg, arguments)?;
            cg.set_pos(call.pos);
            cg.emit(OpCode::Call(argc));
        }
    }
    Ok(())
}

fn compile_arguments(cg: &mut CodeGen, arguments: &[Expr]) -> Result<(), CompileError> {
    for arg in arguments {
        compile_expr(cg, arg)?;
    }
    Ok(())
}
