//! 提供给脚本的宿主函数

use crate::config::Literal;
use orbit_api::{Context, Error, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// 注册 `print`、`env`、`clock`
pub fn register(ctx: &Context) {
    ctx.set_func_void("print", |_, args| {
        let line: Vec<String> = args.iter().map(Value::as_string).collect();
        println!("{}", line.join(" "));
    });

    ctx.set_func("env", |ctx, args| {
        let name = args
            .first()
            .ok_or_else(|| Error::host("env() expects a variable name"))?
            .get_string()?;
        Ok(std::env::var(&name)
            .map(|value| ctx.string(&value))
            .unwrap_or(Value::Null))
    });

    // 秒，浮点
    ctx.set_func("clock", |_, _| {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::host(e.to_string()))?;
        Ok(Value::from(elapsed.as_secs_f64()))
    });

    debug!(target: "orbit::cli", "Registered host functions");
}

/// 把 `--set` 的值绑定为顶层变量
pub fn bind(ctx: &Context, name: &str, literal: &Literal) -> Result<(), Error> {
    match literal {
        Literal::Null => ctx.set_var(name, Value::Null),
        Literal::Bool(b) => ctx.set_var(name, *b),
        Literal::Int(n) => ctx.set_var(name, *n),
        Literal::Float(f) => ctx.set_var(name, *f),
        Literal::Text(s) => ctx.set_var(name, s.as_str()),
    }
}
