//! 字节码执行循环

use super::call::Thread;
use super::{RuntimeError, Vm};
use crate::runtime::bytecode::{ClassProto, Constant, OpCode, Proto};
use crate::runtime::delegate::{Delegate, SourcePosition};
use crate::runtime::heap::ObjRef;
use crate::runtime::object::{ClosureObj, FunctionKind, FunctionObj, Object};
use crate::runtime::operators::{add_values, arith_values, compare_values, negate_value, values_equal};
use crate::runtime::value::Value;
use std::rc::Rc;
#[cfg(feature = "trace_execution")]
use tracing::trace;

impl Vm {
    /// 执行 Thread 直到最外层帧返回
    pub(super) fn execute(&self, thread: &mut Thread, delegate: &dyn Delegate) -> Result<Value, RuntimeError> {
        loop {
            match self.step(thread, delegate) {
                Ok(Some(result)) => return Ok(result),
                Ok(None) => {}
                Err(mut err) => {
                    if err.position.is_none() {
                        err.position = current_position(thread);
                    }
                    return Err(err);
                }
            }
        }
    }

    /// 执行一条指令；最外层帧返回时给出结果
    fn step(&self, thread: &mut Thread, delegate: &dyn Delegate) -> Result<Option<Value>, RuntimeError> {
        let Some(frame) = thread.frames.last_mut() else {
            return Ok(Some(Value::Null));
        };
        let base = frame.base;
        let op = frame.proto.chunk.code.get(frame.ip).copied().unwrap_or(OpCode::Return);
        frame.ip += 1;

        #[cfg(feature = "trace_execution")]
        trace!(target: "orbit::vm", ip = frame.ip - 1, ?op, stack = thread.stack.len(), "execute");

        match op {
            // ===== 常量 =====
            OpCode::Constant(idx) => {
                let value = match constant(thread, idx)? {
                    Constant::Int(n) => Value::Int(n),
                    Constant::Float(f) => Value::Float(f),
                    Constant::Str(s) => self.intern(&s),
                    Constant::Function(_) | Constant::Class(_) => {
                        return Err(RuntimeError::new("Invalid constant operand"));
                    }
                };
                thread.stack.push(value);
            }
            OpCode::Null => thread.stack.push(Value::Null),
            OpCode::True => thread.stack.push(Value::Bool(true)),
            OpCode::False => thread.stack.push(Value::Bool(false)),
            OpCode::Pop => {
                thread.pop();
            }

            // ===== 变量 =====
            OpCode::GetLocal(slot) => {
                let value = local(thread, base, slot);
                thread.stack.push(value);
            }
            OpCode::SetLocal(slot) => {
                let value = thread.peek(0);
                set_local(thread, base, slot, value);
            }
            OpCode::BoxLocal(slot) => {
                let value = local(thread, base, slot);
                let cell = self.heap.borrow_mut().alloc(Object::Upvalue(value));
                set_local(thread, base, slot, Value::Object(cell));
            }
            OpCode::GetBoxed(slot) => {
                let value = self.read_cell(local(thread, base, slot).as_object())?;
                thread.stack.push(value);
            }
            OpCode::SetBoxed(slot) => {
                let value = thread.peek(0);
                self.write_cell(local(thread, base, slot).as_object(), value)?;
            }
            OpCode::GetUpvalue(i) => {
                let value = self.read_cell(upvalue(thread, i))?;
                thread.stack.push(value);
            }
            OpCode::SetUpvalue(i) => {
                let value = thread.peek(0);
                self.write_cell(upvalue(thread, i), value)?;
            }
            OpCode::DefineGlobal(idx) => {
                let name = name_constant(thread, idx)?;
                let value = thread.pop();
                self.globals.borrow_mut().insert(name, value);
            }
            OpCode::GetGlobal(idx) => {
                let name = name_constant(thread, idx)?;
                let value = self.globals.borrow().get(&name).copied();
                match value {
                    Some(v) => thread.stack.push(v),
                    None => return Err(RuntimeError::new(format!("Undefined variable '{name}'"))),
                }
            }
            OpCode::SetGlobal(idx) => {
                let name = name_constant(thread, idx)?;
                let value = thread.peek(0);
                self.globals.borrow_mut().insert(name, value);
            }

            // ===== 成员与索引 =====
            OpCode::GetProperty(idx) => {
                let name = name_constant(thread, idx)?;
                let object = thread.pop();
                let value = self.property_get(object, &name)?;
                thread.stack.push(value);
            }
            OpCode::SetProperty(idx) => {
                let name = name_constant(thread, idx)?;
                let value = thread.pop();
                let object = thread.pop();
                self.property_set(object, &name, value)?;
                thread.stack.push(value);
            }
            OpCode::GetIndex => {
                let index = thread.pop();
                let object = thread.pop();
                let value = self.index_get(object, index)?;
                thread.stack.push(value);
            }
            OpCode::SetIndex => {
                let value = thread.pop();
                let index = thread.pop();
                let object = thread.pop();
                self.index_set(object, index, value)?;
                thread.stack.push(value);
            }

            // ===== 运算 =====
            OpCode::Add => {
                let b = thread.pop();
                let a = thread.pop();
                let result = add_values(&mut self.heap.borrow_mut(), a, b)?;
                thread.stack.push(result);
            }
            OpCode::Subtract | OpCode::Multiply | OpCode::Divide | OpCode::Modulo => {
                let symbol = match op {
                    OpCode::Subtract => '-',
                    OpCode::Multiply => '*',
                    OpCode::Divide => '/',
                    _ => '%',
                };
                let b = thread.pop();
                let a = thread.pop();
                let result = arith_values(&self.heap.borrow(), symbol, a, b)?;
                thread.stack.push(result);
            }
            OpCode::Negate => {
                let a = thread.pop();
                let result = negate_value(&self.heap.borrow(), a)?;
                thread.stack.push(result);
            }
            OpCode::Not => {
                let a = thread.pop();
                thread.stack.push(Value::Bool(a.is_falsey()));
            }
            OpCode::Equal | OpCode::NotEqual => {
                let b = thread.pop();
                let a = thread.pop();
                let equal = values_equal(a, b);
                thread.stack.push(Value::Bool(equal == (op == OpCode::Equal)));
            }
            OpCode::Less | OpCode::LessEqual | OpCode::Greater | OpCode::GreaterEqual => {
                let symbol = match op {
                    OpCode::Less => "<",
                    OpCode::LessEqual => "<=",
                    OpCode::Greater => ">",
                    _ => ">=",
                };
                let b = thread.pop();
                let a = thread.pop();
                let result = compare_values(&self.heap.borrow(), symbol, a, b)?;
                thread.stack.push(Value::Bool(result));
            }

            // ===== 控制流 =====
            OpCode::Jump(target) => jump(thread, target),
            OpCode::JumpIfFalse(target) => {
                if thread.pop().is_falsey() {
                    jump(thread, target);
                }
            }
            OpCode::JumpIfFalseOrPop(target) => {
                if thread.peek(0).is_falsey() {
                    jump(thread, target);
                } else {
                    thread.pop();
                }
            }
            OpCode::JumpIfTrueOrPop(target) => {
                if thread.peek(0).is_falsey() {
                    thread.pop();
                } else {
                    jump(thread, target);
                }
            }
            OpCode::ForIter { seq, exit } => match self.iterate(thread, base + seq as usize)? {
                Some(value) => thread.stack.push(value),
                None => jump(thread, exit),
            },

            // ===== 调用 =====
            OpCode::Call(argc) => {
                let callee_slot = thread.stack.len() - argc as usize - 1;
                let callee = thread.stack[callee_slot];
                self.dispatch(thread, callee, callee_slot, delegate)?;
            }
            OpCode::Invoke(idx, argc) => {
                let name = name_constant(thread, idx)?;
                self.invoke(thread, &name, argc as usize, delegate)?;
            }
            OpCode::Closure(idx) => {
                let Constant::Function(proto) = constant(thread, idx)? else {
                    return Err(RuntimeError::new("Invalid closure operand"));
                };
                let closure = self.make_closure(thread, base, proto)?;
                thread.stack.push(Value::Object(closure));
            }
            OpCode::Class(idx) => {
                let Constant::Class(proto) = constant(thread, idx)? else {
                    return Err(RuntimeError::new("Invalid class operand"));
                };
                let superclass = if proto.has_super {
                    let value = thread.pop();
                    let class = value.as_object().filter(|r| self.heap.borrow().class(*r).is_some());
                    match class {
                        Some(r) => Some(r),
                        None => {
                            return Err(RuntimeError::new(format!(
                                "Superclass of {} must be a class",
                                proto.name
                            )))
                        }
                    }
                } else {
                    None
                };
                let class = self.make_class(&proto, superclass)?;
                thread.stack.push(Value::Object(class));
            }
            OpCode::Return => {
                let result = thread.pop();
                if let Some(frame) = self.pop_frame(thread) {
                    thread.stack.truncate(frame.base);
                }
                if thread.frames.is_empty() {
                    return Ok(Some(result));
                }
                thread.stack.push(result);
            }
            OpCode::Throw => {
                let value = thread.pop();
                return Err(RuntimeError::new(self.display(value)));
            }

            // ===== 构造 =====
            OpCode::BuildList(count) => {
                let start = thread.stack.len() - count as usize;
                let items: Vec<Value> = thread.stack.drain(start..).collect();
                let list = self.new_list(items);
                thread.stack.push(list);
            }
            OpCode::BuildMap(count) => {
                let start = thread.stack.len() - 2 * count as usize;
                let flat: Vec<Value> = thread.stack.drain(start..).collect();
                let entries = flat.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect();
                let map = self.new_map(entries);
                thread.stack.push(map);
            }
            OpCode::BuildRange { inclusive } => {
                let to = thread.pop();
                let from = thread.pop();
                let (Value::Int(from), Value::Int(to)) = (from, to) else {
                    return Err(RuntimeError::new("Range bounds must be integers"));
                };
                let to = if inclusive { to } else { to.saturating_sub(1) };
                let range = self.new_range(from, to);
                thread.stack.push(range);
            }
        }
        Ok(None)
    }

    /// receiver.name(args)：实例方法 → 内建方法 → 取成员后调用
    fn invoke(&self, thread: &mut Thread, name: &str, argc: usize, delegate: &dyn Delegate) -> Result<(), RuntimeError> {
        let base = thread.stack.len() - argc - 1;
        let receiver = thread.stack[base];

        if let Some(class) = receiver.as_object().and_then(|r| self.class_of(r)) {
            let Some(member) = self.lookup_member(class, name) else {
                let class_name = self.class_name(class).unwrap_or_else(|| Rc::from("?"));
                return Err(RuntimeError::new(format!("Instance of {class_name} has no member '{name}'")));
            };
            // 实例变量：调用其中保存的值，而不是访问器
            let callee = match member.as_object().and_then(|r| self.ivar_index(r)) {
                Some(index) => receiver
                    .as_object()
                    .and_then(|r| self.get_ivar(r, index))
                    .ok_or_else(|| RuntimeError::new(format!("Instance variable '{name}' is out of range")))?,
                None => member,
            };
            return self.dispatch(thread, callee, base, delegate);
        }

        if let Some(result) = self.builtin_method(receiver, name, &thread.stack[base + 1..]) {
            let value = result?;
            thread.stack.truncate(base);
            thread.stack.push(value);
            return Ok(());
        }

        let callee = self.property_get(receiver, name)?;
        self.dispatch(thread, callee, base, delegate)
    }

    /// 创建闭包并捕获 upvalue
    fn make_closure(&self, thread: &Thread, base: usize, proto: Rc<Proto>) -> Result<ObjRef, RuntimeError> {
        let mut captured = Vec::with_capacity(proto.upvalues.len());
        for desc in &proto.upvalues {
            let cell = if desc.from_parent_local {
                thread
                    .stack
                    .get(base + desc.index as usize)
                    .and_then(|v| v.as_object())
            } else {
                upvalue(thread, desc.index)
            };
            match cell {
                Some(r) => captured.push(r),
                None => return Err(RuntimeError::new("Captured variable is not boxed")),
            }
        }

        let mut heap = self.heap.borrow_mut();
        let function = heap.alloc(Object::Function(FunctionObj {
            name: proto.name.clone(),
            kind: FunctionKind::Script(proto),
            owner: None,
        }));
        Ok(heap.alloc(Object::Closure(ClosureObj {
            function,
            upvalues: Rc::from(captured),
        })))
    }

    /// 由类原型创建类对象：实例变量访问器、方法与初始化方法
    fn make_class(&self, proto: &ClassProto, superclass: Option<ObjRef>) -> Result<ObjRef, RuntimeError> {
        let class = self.new_class(&proto.name, superclass)?;
        for ivar in &proto.ivars {
            self.class_add_ivar(class, ivar);
        }
        for method in proto.methods.iter().chain(proto.initializer.iter()) {
            let closure = {
                let mut heap = self.heap.borrow_mut();
                let function = heap.alloc(Object::Function(FunctionObj {
                    name: method.name.clone(),
                    kind: FunctionKind::Script(method.clone()),
                    owner: Some(class),
                }));
                heap.alloc(Object::Closure(ClosureObj {
                    function,
                    upvalues: Rc::from(Vec::new()),
                }))
            };
            self.class_set_member(class, &method.name, Value::Object(closure));
        }
        Ok(class)
    }

    fn read_cell(&self, cell: Option<ObjRef>) -> Result<Value, RuntimeError> {
        let heap = self.heap.borrow();
        match cell.filter(|r| heap.contains(*r)).map(|r| heap.get(r)) {
            Some(Object::Upvalue(v)) => Ok(*v),
            _ => Err(RuntimeError::new("Invalid captured variable")),
        }
    }

    fn write_cell(&self, cell: Option<ObjRef>, value: Value) -> Result<(), RuntimeError> {
        let mut heap = self.heap.borrow_mut();
        let Some(r) = cell.filter(|r| heap.contains(*r)) else {
            return Err(RuntimeError::new("Invalid captured variable"));
        };
        match heap.get_mut(r) {
            Object::Upvalue(v) => {
                *v = value;
                Ok(())
            }
            _ => Err(RuntimeError::new("Invalid captured variable")),
        }
    }
}

// ==================== 帧访问 ====================

fn local(thread: &Thread, base: usize, slot: u8) -> Value {
    thread.stack.get(base + slot as usize).copied().unwrap_or(Value::Null)
}

fn set_local(thread: &mut Thread, base: usize, slot: u8, value: Value) {
    if let Some(cell) = thread.stack.get_mut(base + slot as usize) {
        *cell = value;
    }
}

fn upvalue(thread: &Thread, index: u8) -> Option<ObjRef> {
    thread
        .frames
        .last()
        .and_then(|f| f.upvalues.get(index as usize).copied())
}

fn jump(thread: &mut Thread, target: usize) {
    if let Some(frame) = thread.frames.last_mut() {
        frame.ip = target;
    }
}

fn constant(thread: &Thread, idx: u16) -> Result<Constant, RuntimeError> {
    thread
        .frames
        .last()
        .and_then(|f| f.proto.chunk.constants.get(idx as usize).cloned())
        .ok_or_else(|| RuntimeError::new("Constant index out of range"))
}

fn name_constant(thread: &Thread, idx: u16) -> Result<Rc<str>, RuntimeError> {
    match constant(thread, idx)? {
        Constant::Str(s) => Ok(s),
        _ => Err(RuntimeError::new("Expected a name constant")),
    }
}

/// 当前帧正在执行的指令位置
fn current_position(thread: &Thread) -> Option<SourcePosition> {
    let frame = thread.frames.last()?;
    let info = frame.proto.chunk.line_at(frame.ip.saturating_sub(1))?;
    Some(SourcePosition {
        file_id: info.file_id,
        line: info.line,
        column: 0,
    })
}
