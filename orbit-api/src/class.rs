//! 宿主侧的类定义

use crate::context::{Context, HostMethod};
use crate::error::Error;
use crate::instance::Instance;
use crate::value::{Handle, RawValue, Value};
use orbit_core::ObjRef;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// 脚本类：实例变量槽位 + 方法，可选一个父类
#[derive(Clone, Copy)]
pub struct Class<'ctx> {
    ctx: &'ctx Context,
    class: ObjRef,
}

impl<'ctx> Class<'ctx> {
    pub(crate) fn new(ctx: &'ctx Context, class: ObjRef) -> Self {
        Self { ctx, class }
    }

    pub(crate) fn obj(&self) -> ObjRef {
        self.class
    }

    pub fn context(&self) -> &'ctx Context {
        self.ctx
    }

    pub fn name(&self) -> String {
        self.ctx
            .vm()
            .class_name(self.class)
            .map(|n| n.to_string())
            .unwrap_or_default()
    }

    pub fn superclass(&self) -> Option<Class<'ctx>> {
        self.ctx.vm().superclass_of(self.class).map(|s| Class::new(self.ctx, s))
    }

    pub fn value(&self) -> Value<'ctx> {
        Value::Class(Handle::new(self.ctx, self.class))
    }

    /// 添加实例变量，返回它的槽位
    ///
    /// 已经创建的实例不会扩容：访问新变量时得到 [`Error::StaleReference`]。
    /// 类一旦有了子类，布局就固定了，再添加也返回 [`Error::StaleReference`]。
    pub fn add_var(&self, name: &str) -> Result<u32, Error> {
        let slot = self
            .ctx
            .vm()
            .class_add_ivar(self.class, name)
            .ok_or_else(|| Error::StaleReference { name: name.to_string() })?;
        debug!(target: "orbit::api", class = %self.name(), var = name, slot, "Added instance variable");
        Ok(slot)
    }

    /// 添加由宿主实现的方法。`body` 收到 `(context, receiver, args)`
    pub fn add_func<F>(&self, name: &str, body: F) -> Result<(), Error>
    where
        F: for<'c> Fn(&'c Context, Value<'c>, &[Value<'c>]) -> Result<Value<'c>, Error> + 'static,
    {
        let vm = self.ctx.vm();
        let closure = vm.new_bridged_closure(name, Some(self.class));
        if !vm.class_set_member(self.class, name, RawValue::Object(closure)) {
            return Err(Error::StaleReference { name: name.to_string() });
        }
        let method: HostMethod = Rc::new(body);
        self.ctx.register_method(self.class, name, method);
        debug!(target: "orbit::api", class = %self.name(), method = name, "Added host method");
        Ok(())
    }

    /// 创建实例：所有槽位为 null，不调用 `init`
    pub fn create_instance(&self) -> Result<Instance<'ctx>, Error> {
        self.ctx
            .vm()
            .new_instance(self.class)
            .map(|obj| Instance::new(self.ctx, obj))
            .ok_or_else(|| Error::StaleReference { name: self.name() })
    }
}

impl fmt::Debug for Class<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Class").field(&self.name()).finish()
    }
}

impl PartialEq for Class<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.value() == other.value()
    }
}
