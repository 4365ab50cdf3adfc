//! Context 测试
//!
//! 编译、执行、顶层变量与宿主函数

mod common;
use common::{context_with, run, with_print};
use orbit_api::{Context, Error, LookupError, Value, ValueKind};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

// ===== 顶层变量 =====

#[test]
fn test_variable_kinds_match_declarations() {
    let ctx = context_with(
        r#"
        var i = 1
        var f = 2.5
        var s = "text"
        var b = true
        var l = [1, 2]
        var m = ["a": 1]
        var r = 1...3
        var n = null
        func g() {}
        class K {}
        var inst = K()
        "#,
    );
    let kinds = [
        ("i", ValueKind::Int),
        ("f", ValueKind::Float),
        ("s", ValueKind::String),
        ("b", ValueKind::Bool),
        ("l", ValueKind::List),
        ("m", ValueKind::Map),
        ("r", ValueKind::Range),
        ("n", ValueKind::Null),
        ("g", ValueKind::Closure),
        ("K", ValueKind::Class),
        ("inst", ValueKind::Instance),
        ("missing", ValueKind::Null),
    ];
    for (name, kind) in kinds {
        assert_eq!(ctx.get_var(name).unwrap().kind(), kind, "variable {name}");
    }
}

#[test]
fn test_typed_reads() {
    let ctx = context_with(
        r#"
        var i = 7
        var s = "hello"
        var l = [1, "two", 3.0]
        var m = ["a": 1, "b": 2]
        var r = 2...5
        "#,
    );
    assert_eq!(ctx.get_var_as::<i64>("i").unwrap(), 7);
    assert_eq!(ctx.get_var_as::<String>("s").unwrap(), "hello");
    assert_eq!(ctx.get_var_as::<std::ops::RangeInclusive<i64>>("r").unwrap(), 2..=5);

    let list: Vec<Value> = ctx.get_var_as("l").unwrap();
    assert_eq!(list.len(), 3);
    assert_eq!(list[0], Value::Int(1));
    assert_eq!(list[1].get_string().unwrap(), "two");
    assert_eq!(list[2], Value::Float(3.0));

    let map: HashMap<Value, Value> = ctx.get_var_as("m").unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map.get(&ctx.string("b")), Some(&Value::Int(2)));

    let err = ctx.get_var_as::<i64>("s").unwrap_err();
    assert_eq!(
        err,
        Error::TypeMismatch {
            expected: "int",
            found: "string"
        }
    );
}

#[test]
fn test_host_variables_are_visible_to_scripts() {
    let ctx = Context::new();
    ctx.set_var("limit", 10).unwrap();
    ctx.set_var("names", vec!["a", "b", "c"]).unwrap();
    ctx.set_var("span", 1..4).unwrap();
    run(
        &ctx,
        r#"
        var doubled = limit * 2
        var joined = ""
        for (n in names) { joined = joined + n }
        var total = 0
        for (x in span) { total = total + x }
        "#,
    );
    assert_eq!(ctx.get_var("doubled").unwrap(), Value::Int(20));
    assert_eq!(ctx.get_var_as::<String>("joined").unwrap(), "abc");
    assert_eq!(ctx.get_var("total").unwrap(), Value::Int(6));
}

#[test]
fn test_globals_survive_recompilation() {
    let ctx = context_with("var a = 1");
    run(&ctx, "var b = a + 1");
    assert_eq!(ctx.get_var("b").unwrap(), Value::Int(2));
}

#[test]
fn test_main_function_result() {
    let ctx = Context::new();
    ctx.compile("var base = 40\nfunc main() { return base + 2 }", None).unwrap();
    assert!(!ctx.did_run_main());
    assert_eq!(ctx.run_main().unwrap(), Value::Int(42));
    assert!(ctx.did_run_main());
}

#[test]
fn test_strings_are_interned() {
    let ctx = Context::new();
    assert_eq!(ctx.string("same"), ctx.string("same"));
    assert_ne!(ctx.string("same"), ctx.string("other"));
}

// ===== 宿主函数 =====

#[test]
fn test_host_function_receives_arguments() {
    let ctx = Context::new();
    let seen: Rc<RefCell<Vec<i64>>> = Rc::default();
    let sink = seen.clone();
    ctx.set_func("f", move |_, args| {
        let ints: Vec<i64> = args.iter().map(|a| a.get_int()).collect::<Result<_, _>>()?;
        sink.borrow_mut().extend(&ints);
        Ok(Value::Int(ints.iter().sum()))
    });
    run(&ctx, "var r = f(1, 2)");
    assert_eq!(*seen.borrow(), vec![1, 2]);
    assert_eq!(ctx.get_var("r").unwrap(), Value::Int(3));
}

#[test]
fn test_host_function_returns_script_values() {
    let ctx = Context::new();
    ctx.set_func("greet", |ctx, args| {
        let name = args.first().map(Value::as_string).unwrap_or_default();
        Ok(ctx.string(&format!("hi {name}")))
    });
    ctx.set_func("pair", |ctx, _| ctx.create_value(vec![1, 2]));
    run(&ctx, "var g = greet(\"bob\")\nvar p = pair().count");
    assert_eq!(ctx.get_var_as::<String>("g").unwrap(), "hi bob");
    assert_eq!(ctx.get_var("p").unwrap(), Value::Int(2));
}

#[test]
fn test_void_function_yields_null() {
    let ctx = Context::new();
    let output = with_print(&ctx);
    run(&ctx, "var r = print(\"x\", 1, [2])");
    assert_eq!(*output.borrow(), vec!["x 1 [2]".to_string()]);
    assert!(ctx.get_var("r").unwrap().is_null());
}

#[test]
fn test_host_error_becomes_runtime_error() {
    let ctx = Context::new();
    ctx.set_func("check", |_, _| Err(Error::host("bad input")));
    ctx.compile("var before = 1\ncheck()\nvar after = 2", Some(true)).unwrap();
    let err = ctx.run_main().unwrap_err();
    assert!(matches!(err, Error::Runtime { .. }), "{err:?}");
    assert!(err.to_string().contains("bad input"));
    assert!(!ctx.did_run_main());
}

#[test]
fn test_host_function_can_call_back_into_script() {
    let ctx = Context::new();
    ctx.set_func("apply", |_, args| {
        let callback = args[0].get_closure()?;
        callback.run(&args[1..])
    });
    run(&ctx, "var r = apply(func(x) { return x * 10 }, 4)");
    assert_eq!(ctx.get_var("r").unwrap(), Value::Int(40));
}

#[test]
fn test_reregistered_function_replaces_binding() {
    let ctx = Context::new();
    ctx.set_func("version", |_, _| Ok(Value::Int(1)));
    ctx.set_func("version", |_, _| Ok(Value::Int(2)));
    run(&ctx, "var v = version()");
    assert_eq!(ctx.get_var("v").unwrap(), Value::Int(2));
}

// ===== 脚本函数 =====

#[test]
fn test_run_script_function() {
    let ctx = context_with("func add(a, b) { return a + b }\nvar i = 1");
    let sum = ctx.run_func("add", &[Value::Int(2), Value::Int(3)]).unwrap();
    assert_eq!(sum, Value::Int(5));

    // 闭包可以反复调用
    let add = ctx.get_func("add").unwrap();
    assert_eq!(add.name().as_deref(), Some("add"));
    assert_eq!(add.run(&[Value::Int(1), Value::Int(1)]).unwrap(), Value::Int(2));
    assert_eq!(add.run(&[ctx.string("a"), ctx.string("b")]).unwrap().as_string(), "ab");
}

#[test]
fn test_function_lookup_errors() {
    let ctx = context_with("var i = 1");
    assert_eq!(
        ctx.get_func("missing").unwrap_err(),
        Error::Lookup(LookupError::NotFound {
            kind: "Closure",
            name: "missing".to_string()
        })
    );
    assert_eq!(
        ctx.get_func("i").unwrap_err().to_string(),
        "Expected Closure for key i. Found int"
    );
}

#[test]
fn test_script_error_inside_closure_call() {
    let ctx = context_with("func div(a, b) { return a / b }");
    let err = ctx.run_func("div", &[Value::Int(1), Value::Int(0)]).unwrap_err();
    assert!(err.to_string().contains("Division by zero"));

    // 错误不会残留到下一次调用
    assert_eq!(ctx.run_func("div", &[Value::Int(6), Value::Int(3)]).unwrap(), Value::Int(2));
}

// ===== 错误 =====

#[test]
fn test_top_level_throw() {
    let ctx = Context::new();
    ctx.compile("var x = 1\nthrow \"stop here\"", Some(true)).unwrap();
    let err = ctx.run_main().unwrap_err();
    match &err {
        Error::Runtime { message, line, .. } => {
            assert!(!message.is_empty());
            assert!(message.contains("stop here"));
            assert_eq!(*line, Some(2));
        }
        other => panic!("expected runtime error, got {other:?}"),
    }
    assert!(!ctx.did_run_main());
    assert_eq!(ctx.get_var("x").unwrap_err(), Error::MainNotRun);
}

#[test]
fn test_runtime_error_line() {
    let ctx = Context::new();
    ctx.compile("var a = 1\nvar b = 0\nvar c = a / b", Some(true)).unwrap();
    let err = ctx.run_main().unwrap_err();
    assert_eq!(err.line(), Some(3));
    assert_eq!(err.phase(), "runtime");
    assert!(err.to_report().message.contains("Division by zero"));
}

#[test]
fn test_compile_errors() {
    let ctx = Context::new();
    let err = ctx.compile("var x = ", None).unwrap_err();
    assert!(matches!(err, Error::Compile { .. }), "{err:?}");
    assert_eq!(err.line(), Some(1));
    assert_eq!(err.to_report().phase, "compiler");

    let err = ctx.compile("return missing", None).unwrap_err();
    assert!(matches!(err, Error::Compile { .. }), "{err:?}");
    assert_eq!(ctx.run_main().unwrap_err(), Error::NoEntryPoint);
}

#[test]
fn test_host_globals_are_predeclared() {
    let ctx = Context::new();
    // 未注册时是语义错误
    assert!(ctx.compile("var r = helper()", None).is_err());

    ctx.set_func("helper", |_, _| Ok(Value::Bool(true)));
    run(&ctx, "var r = helper()");
    assert_eq!(ctx.get_var("r").unwrap(), Value::Bool(true));
}

#[test]
fn test_get_instance_lookup_errors() {
    let ctx = context_with("var i = 1");
    let err = ctx.get_instance("missing").unwrap_err();
    assert!(matches!(err, Error::Lookup(LookupError::NotFound { .. })));
    assert_eq!(err.to_string(), "Failed to find Instance named missing");
    assert!(matches!(
        ctx.get_instance("i").unwrap_err(),
        Error::Lookup(LookupError::WrongType { found: "int", .. })
    ));
}

#[test]
fn test_values_cannot_cross_contexts() {
    let a = Context::new();
    let b = Context::new();
    let text = a.string("mine");
    assert_eq!(b.set_var("x", text).unwrap_err(), Error::ForeignValue);
    assert_eq!(b.list(vec![text]).unwrap_err(), Error::ForeignValue);
    // 标量不属于任何上下文
    assert!(b.set_var("y", Value::Int(1)).is_ok());
}
