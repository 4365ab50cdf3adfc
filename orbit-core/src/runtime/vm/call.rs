//! 函数调用相关（调用帧、参数适配、构造实例）

use super::{RuntimeError, Vm};
use crate::runtime::bytecode::Proto;
use crate::runtime::delegate::Delegate;
use crate::runtime::heap::ObjRef;
use crate::runtime::object::{FunctionKind, Object};
use crate::runtime::value::Value;
use std::cell::Cell;
use std::rc::Rc;
use tracing::trace;

/// 调用帧
#[derive(Debug, Clone)]
pub(super) struct CallFrame {
    pub proto: Rc<Proto>,
    pub upvalues: Rc<[ObjRef]>,
    pub ip: usize,
    /// 槽位 0（接收者）在栈中的位置
    pub base: usize,
}

/// 一次从宿主进入虚拟机的执行：独立的值栈与调用帧
#[derive(Debug, Default)]
pub(super) struct Thread {
    pub stack: Vec<Value>,
    pub frames: Vec<CallFrame>,
}

impl Thread {
    pub fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or(Value::Null)
    }

    pub fn peek(&self, distance: usize) -> Value {
        self.stack
            .len()
            .checked_sub(distance + 1)
            .and_then(|i| self.stack.get(i).copied())
            .unwrap_or(Value::Null)
    }
}

/// 离开作用域时恢复调用深度（出错时 Thread 中剩余的帧一并作废）
pub(super) struct DepthScope<'a> {
    depth: &'a Cell<usize>,
    saved: usize,
}

impl<'a> DepthScope<'a> {
    pub fn new(depth: &'a Cell<usize>) -> Self {
        Self {
            depth,
            saved: depth.get(),
        }
    }
}

impl Drop for DepthScope<'_> {
    fn drop(&mut self) {
        self.depth.set(self.saved);
    }
}

/// 被调用者的分类结果（不持有堆借用）
enum Callee {
    Script(Rc<Proto>, Rc<[ObjRef]>),
    Bridged(ObjRef),
    Ivar(u32),
    Class(ObjRef),
    NotCallable(&'static str),
}

impl Vm {
    /// 从宿主调用任意可调用值，`receiver` 作为 self
    pub fn call(
        &self,
        callee: Value,
        receiver: Value,
        args: &[Value],
        delegate: &dyn Delegate,
    ) -> Result<Value, RuntimeError> {
        let _scope = DepthScope::new(&self.depth);
        let mut thread = Thread::default();
        thread.stack.push(receiver);
        thread.stack.extend_from_slice(args);

        self.dispatch(&mut thread, callee, 0, delegate)?;
        if thread.frames.is_empty() {
            Ok(thread.pop())
        } else {
            self.execute(&mut thread, delegate)
        }
    }

    /// 调用 `callee`：`stack[base]` 是接收者，其后是实参
    ///
    /// 脚本函数压入新帧后返回；其他可调用值立即执行，结果替换 `stack[base..]`。
    pub(super) fn dispatch(
        &self,
        thread: &mut Thread,
        callee: Value,
        base: usize,
        delegate: &dyn Delegate,
    ) -> Result<(), RuntimeError> {
        match self.classify(callee) {
            Callee::Script(proto, upvalues) => self.push_frame(thread, proto, upvalues, base),
            Callee::Bridged(closure) => {
                let args: Vec<Value> = thread.stack.drain(base..).collect();
                trace!(target: "orbit::vm", argc = args.len() - 1, "Calling host function");
                let depth = self.depth.get();
                if depth >= self.limits.max_call_depth {
                    return Err(RuntimeError::new("Stack overflow"));
                }
                self.depth.set(depth + 1);
                let result = delegate.bridge_execute(self, closure, &args);
                self.depth.set(depth);
                thread.stack.push(result.map_err(RuntimeError::new)?);
                Ok(())
            }
            Callee::Ivar(index) => {
                let args: Vec<Value> = thread.stack.drain(base..).collect();
                let instance = args.first().copied().and_then(Value::as_object);
                let result = match (instance, args.get(1)) {
                    (Some(r), None) => self.get_ivar(r, index),
                    (Some(r), Some(value)) => self.set_ivar(r, index, *value).then_some(*value),
                    (None, _) => None,
                };
                match result {
                    Some(v) => {
                        thread.stack.push(v);
                        Ok(())
                    }
                    None => Err(RuntimeError::new("Instance variable accessed on an invalid receiver")),
                }
            }
            Callee::Class(class) => {
                let args: Vec<Value> = thread.stack.drain(base..).skip(1).collect();
                let instance = self.construct(class, &args, delegate)?;
                thread.stack.push(instance);
                Ok(())
            }
            Callee::NotCallable(type_name) => Err(RuntimeError::new(format!(
                "Attempt to call a non-callable value of type {type_name}"
            ))),
        }
    }

    fn classify(&self, callee: Value) -> Callee {
        let heap = self.heap.borrow();
        let Some(r) = callee.as_object() else {
            return Callee::NotCallable(heap.type_name(callee));
        };
        if !heap.contains(r) {
            return Callee::NotCallable("invalid reference");
        }
        match heap.get(r) {
            Object::Closure(closure) => match heap.function(closure.function).map(|f| &f.kind) {
                Some(FunctionKind::Script(proto)) => Callee::Script(proto.clone(), closure.upvalues.clone()),
                Some(FunctionKind::Bridged) => Callee::Bridged(r),
                Some(FunctionKind::Ivar { index }) => Callee::Ivar(*index),
                None => Callee::NotCallable("closure"),
            },
            Object::Class(_) => Callee::Class(r),
            other => Callee::NotCallable(other.kind().name()),
        }
    }

    /// 压入脚本函数帧：缺少的参数补 null，多余的丢弃
    fn push_frame(
        &self,
        thread: &mut Thread,
        proto: Rc<Proto>,
        upvalues: Rc<[ObjRef]>,
        base: usize,
    ) -> Result<(), RuntimeError> {
        let depth = self.depth.get();
        if depth >= self.limits.max_call_depth || thread.stack.len() >= self.limits.max_stack_size {
            return Err(RuntimeError::new("Stack overflow"));
        }

        let wanted = base + 1 + proto.arity as usize;
        thread.stack.resize(wanted, Value::Null);

        self.depth.set(depth + 1);
        thread.frames.push(CallFrame {
            proto,
            upvalues,
            ip: 0,
            base,
        });
        Ok(())
    }

    /// 弹出帧（由 Return 调用）
    pub(super) fn pop_frame(&self, thread: &mut Thread) -> Option<CallFrame> {
        let frame = thread.frames.pop()?;
        self.depth.set(self.depth.get().saturating_sub(1));
        Some(frame)
    }

    /// 构造实例：从根类到当前类依次执行实例变量初始化，再调用 `init`
    pub(super) fn construct(
        &self,
        class: ObjRef,
        args: &[Value],
        delegate: &dyn Delegate,
    ) -> Result<Value, RuntimeError> {
        let Some(instance) = self.new_instance(class) else {
            return Err(RuntimeError::new("Cannot instantiate a non-class value"));
        };
        let receiver = Value::Object(instance);

        let mut chain = Vec::new();
        let mut current = Some(class);
        while let Some(c) = current {
            chain.push(c);
            current = self.superclass_of(c);
        }
        for c in chain.into_iter().rev() {
            if let Some(init) = self.own_initializer(c) {
                self.call(init, receiver, &[], delegate)?;
            }
        }

        if let Some(init) = self.lookup_member(class, "init") {
            self.call(init, receiver, args, delegate)?;
        }
        Ok(receiver)
    }
}
