//! 引擎回调
//!
//! 每次进入引擎时为当前 [`Context`] 创建一个 [`Bridge`] 作为 delegate：
//! 错误写入上下文的错误槽，include 交给加载器，原生调用分派到上下文持有的宿主函数表。

use crate::context::Context;
use crate::error::Error;
use crate::value::{RawValue, Value};
use orbit_core::{Delegate, EngineError, LoadedFile, ObjRef, Vm};
use tracing::{debug, trace};

pub(crate) struct Bridge<'a> {
    ctx: &'a Context,
}

impl<'a> Bridge<'a> {
    pub(crate) fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }
}

impl Delegate for Bridge<'_> {
    fn report_error(&self, error: EngineError) {
        let converted = self.ctx.convert_engine_error(error);
        let mut slot = self.ctx.error_slot().borrow_mut();
        // include 失败：保留加载器给出的原因，只补上 include 语句的位置
        if let (Some(Error::Load { file, line, .. }), Error::Load { file: at_file, line: at_line, .. }) =
            (slot.as_mut(), &converted)
        {
            if line.is_none() {
                *file = at_file.clone();
                *line = *at_line;
            }
            return;
        }
        *slot = Some(converted);
    }

    fn filename(&self, file_id: u32) -> Option<String> {
        self.ctx.filename(file_id)
    }

    fn load_file(&self, name: &str) -> Option<LoadedFile> {
        let loaded = self.ctx.loader().borrow_mut().load(name);
        match loaded {
            Ok((source, file_id)) => Some(LoadedFile { source, file_id }),
            Err(err) => {
                debug!(target: "orbit::api", file = name, error = %err, "Include failed");
                *self.ctx.error_slot().borrow_mut() = Some(err);
                None
            }
        }
    }

    /// `args[0]` 是被调用的闭包（普通调用）或接收者（方法调用），转发前去掉
    fn bridge_execute(&self, vm: &Vm, closure: ObjRef, args: &[RawValue]) -> Result<RawValue, String> {
        let ctx = self.ctx;
        let (name, owner) = vm
            .function_info(closure)
            .ok_or_else(|| "Invalid host closure".to_string())?;
        let (receiver, rest) = match args.split_first() {
            Some((first, rest)) => (*first, rest),
            None => (RawValue::Null, args),
        };
        let rest: Vec<Value<'_>> = rest.iter().map(|v| Value::from_raw(ctx, *v)).collect();

        let result = match owner {
            Some(class) => {
                trace!(target: "orbit::api", method = %name, argc = rest.len(), "Dispatching host method");
                let method = ctx
                    .host_method(class, &name)
                    .ok_or_else(|| format!("No host method '{name}' registered"))?;
                method.as_ref()(ctx, Value::from_raw(ctx, receiver), &rest)
            }
            None => {
                trace!(target: "orbit::api", function = %name, argc = rest.len(), "Dispatching host function");
                let function = ctx
                    .host_function(&name)
                    .ok_or_else(|| format!("No host function '{name}' registered"))?;
                function.as_ref()(ctx, &rest)
            }
        };

        result
            .and_then(|value| value.to_raw(ctx))
            .map_err(|err| match err {
                Error::Host(message) => message,
                other => other.to_string(),
            })
    }
}
