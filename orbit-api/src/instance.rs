//! 脚本对象实例
//!
//! 实例变量按名字间接定位：类的成员表 → 访问器闭包 → 函数记录的槽位 → ivar 数组。

use crate::class::Class;
use crate::closure::Closure;
use crate::context::Context;
use crate::error::{Error, LookupError};
use crate::value::{Handle, IntoValue, RawValue, Value};
use orbit_core::ObjRef;
use std::fmt;

#[derive(Clone, Copy)]
pub struct Instance<'ctx> {
    ctx: &'ctx Context,
    instance: ObjRef,
}

impl<'ctx> Instance<'ctx> {
    pub(crate) fn new(ctx: &'ctx Context, instance: ObjRef) -> Self {
        Self { ctx, instance }
    }

    pub fn value(&self) -> Value<'ctx> {
        Value::Instance(Handle::new(self.ctx, self.instance))
    }

    pub fn class(&self) -> Result<Class<'ctx>, Error> {
        self.ctx
            .vm()
            .class_of(self.instance)
            .map(|c| Class::new(self.ctx, c))
            .ok_or_else(|| Error::StaleReference {
                name: "class".to_string(),
            })
    }

    pub fn class_name(&self) -> Result<String, Error> {
        self.class().map(|c| c.name())
    }

    fn member(&self, name: &str, kind: &'static str) -> Result<RawValue, Error> {
        let class = self.class()?.obj();
        self.ctx.vm().lookup_member(class, name).ok_or_else(|| {
            LookupError::NotFound {
                kind,
                name: name.to_string(),
            }
            .into()
        })
    }

    /// 名字 → 槽位
    fn slot(&self, name: &str) -> Result<u32, Error> {
        let member = self.member(name, "variable")?;
        let vm = self.ctx.vm();
        member
            .as_object()
            .and_then(|closure| vm.ivar_index(closure))
            .ok_or_else(|| {
                LookupError::WrongType {
                    kind: "variable",
                    name: name.to_string(),
                    found: Value::from_raw(self.ctx, member).kind().name(),
                }
                .into()
            })
    }

    pub fn get_var(&self, name: &str) -> Result<Value<'ctx>, Error> {
        let slot = self.slot(name)?;
        self.ctx
            .vm()
            .get_ivar(self.instance, slot)
            .map(|v| Value::from_raw(self.ctx, v))
            .ok_or_else(|| Error::StaleReference { name: name.to_string() })
    }

    pub fn set_var(&self, name: &str, value: impl IntoValue<'ctx>) -> Result<(), Error> {
        let slot = self.slot(name)?;
        let raw = value.into_value(self.ctx)?.to_raw(self.ctx)?;
        if self.ctx.vm().set_ivar(self.instance, slot, raw) {
            Ok(())
        } else {
            Err(Error::StaleReference { name: name.to_string() })
        }
    }

    /// 取方法，接收者绑定为本实例
    pub fn get_func(&self, name: &str) -> Result<Closure<'ctx>, Error> {
        let member = Value::from_raw(self.ctx, self.member(name, "closure")?);
        match member {
            // 实例变量的访问器不算方法
            Value::Closure(h) if self.ctx.vm().ivar_index(h.obj).is_some() => Err(LookupError::WrongType {
                kind: "closure",
                name: name.to_string(),
                found: "variable",
            }
            .into()),
            Value::Closure(h) => Ok(Closure::new(self.ctx, h.obj, Some(self.value()))),
            other => Err(LookupError::WrongType {
                kind: "closure",
                name: name.to_string(),
                found: other.kind().name(),
            }
            .into()),
        }
    }

    pub fn run_func(&self, name: &str, args: &[Value<'ctx>]) -> Result<Value<'ctx>, Error> {
        self.get_func(name)?.run(args)
    }
}

impl fmt::Debug for Instance<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Instance")
            .field(&self.class_name().unwrap_or_default())
            .finish()
    }
}

impl PartialEq for Instance<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.value() == other.value()
    }
}
