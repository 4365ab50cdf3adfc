//! 可调用句柄

use crate::context::Context;
use crate::error::Error;
use crate::value::{Handle, RawValue, Value};
use orbit_core::ObjRef;
use std::fmt;

/// 脚本闭包（或宿主函数）的引用，附带可选的接收者
///
/// 调用之间不保存状态；可以反复 [`run`](Closure::run)。
#[derive(Clone, Copy)]
pub struct Closure<'ctx> {
    ctx: &'ctx Context,
    closure: ObjRef,
    sender: Option<Value<'ctx>>,
}

impl<'ctx> Closure<'ctx> {
    pub(crate) fn new(ctx: &'ctx Context, closure: ObjRef, sender: Option<Value<'ctx>>) -> Self {
        Self { ctx, closure, sender }
    }

    /// 绑定接收者（脚本中的 `self`）
    pub fn with_sender(self, sender: Value<'ctx>) -> Self {
        Self {
            sender: Some(sender),
            ..self
        }
    }

    pub fn sender(&self) -> Option<Value<'ctx>> {
        self.sender
    }

    /// 函数名（匿名函数为空字符串）
    pub fn name(&self) -> Option<String> {
        self.ctx.vm().function_info(self.closure).map(|(name, _)| name.to_string())
    }

    pub fn value(&self) -> Value<'ctx> {
        Value::Closure(Handle::new(self.ctx, self.closure))
    }

    /// 以绑定的接收者调用
    pub fn run(&self, args: &[Value<'ctx>]) -> Result<Value<'ctx>, Error> {
        self.run_with(args, self.sender)
    }

    /// 以指定接收者调用（`None` 时接收者为 null）
    pub fn run_with(&self, args: &[Value<'ctx>], sender: Option<Value<'ctx>>) -> Result<Value<'ctx>, Error> {
        let ctx = self.ctx;
        let receiver = match sender {
            Some(v) => v.to_raw(ctx)?,
            None => RawValue::Null,
        };
        let args = args
            .iter()
            .map(|a| a.to_raw(ctx))
            .collect::<Result<Vec<_>, _>>()?;

        ctx.execute(|vm, delegate| vm.run_closure(self.closure, receiver, &args, delegate))
    }
}

impl fmt::Debug for Closure<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.name())
            .field("sender", &self.sender)
            .finish()
    }
}

impl PartialEq for Closure<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.value() == other.value() && self.sender == other.sender
    }
}
