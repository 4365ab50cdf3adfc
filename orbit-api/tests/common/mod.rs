//! 测试辅助工具
//!
//! 创建上下文、注册收集输出的 `print`，并编译执行脚本

#![allow(dead_code)]

use orbit_api::{Context, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// `print` 的输出行
pub type Output = Rc<RefCell<Vec<String>>>;

/// 注册 `print`：参数以空格拼接为一行
pub fn with_print(ctx: &Context) -> Output {
    let output: Output = Rc::default();
    let sink = output.clone();
    ctx.set_func_void("print", move |_, args| {
        let line: Vec<String> = args.iter().map(Value::as_string).collect();
        sink.borrow_mut().push(line.join(" "));
    });
    output
}

/// 编译并执行，失败时 panic
pub fn run(ctx: &Context, source: &str) {
    ctx.compile(source, Some(true)).expect("compile failed");
    ctx.run_main().expect("run_main failed");
}

/// 新上下文中执行源码
pub fn context_with(source: &str) -> Context {
    let ctx = Context::new();
    run(&ctx, source);
    ctx
}
