//! VM 执行测试
//!
//! 端到端测试：编译并执行 Orbit 代码

mod common;
use common::{eval, eval_err, run_code, run_with, TestHost};
use orbit_core::{EngineErrorKind, LimitConfig};
use pretty_assertions::assert_eq;

// ===== 基础运算测试 =====

#[test]
fn test_basic_arithmetic() {
    assert_eq!(eval("return 1 + 2"), "3");
    assert_eq!(eval("return 10 - 3"), "7");
    assert_eq!(eval("return 4 * 5"), "20");
    // 整数除法保持整数
    assert_eq!(eval("return 20 / 6"), "3");
    assert_eq!(eval("return 20 % 6"), "2");
    assert_eq!(eval("return 1 / 2.0"), "0.5");
    assert_eq!(eval("return 2 + 3 * 4"), "14");
    assert_eq!(eval("return (2 + 3) * 4"), "20");
    assert_eq!(eval("return --5"), "5");
}

#[test]
fn test_comparison_and_logic() {
    assert_eq!(eval("return 1 < 2"), "true");
    assert_eq!(eval("return 2 <= 1"), "false");
    assert_eq!(eval("return 1 == 1.0"), "true");
    assert_eq!(eval("return \"a\" != \"b\""), "true");
    assert_eq!(eval("return !null"), "true");
    // 0 和空字符串为真
    assert_eq!(eval("return !0"), "false");
}

#[test]
fn test_short_circuit() {
    // 右侧若被执行会产生除零错误
    assert_eq!(eval("return false && (1 / 0)"), "false");
    assert_eq!(eval("return true || (1 / 0)"), "true");
    assert_eq!(eval("return null || 42"), "42");
    assert_eq!(eval("return 1 && 2"), "2");
}

#[test]
fn test_string_concatenation() {
    assert_eq!(eval("return \"n = \" + 4"), "n = 4");
    assert_eq!(eval("return 1.5 + \"!\""), "1.5!");
    assert_eq!(eval("return \"abc\".count"), "3");
    assert_eq!(eval("return \"abc\"[-1]"), "c");
}

// ===== 变量与作用域 =====

#[test]
fn test_globals_and_locals() {
    let source = r#"
        var x = 1
        func f() {
            var x = 10
            {
                var x = 100
                x = x + 1
            }
            return x
        }
        return f() + x
    "#;
    assert_eq!(eval(source), "11");
}

#[test]
fn test_global_assignment_from_function() {
    let source = r#"
        var counter = 0
        func bump() { counter = counter + 1 }
        bump()
        bump()
        return counter
    "#;
    assert_eq!(eval(source), "2");
}

// ===== 控制流 =====

#[test]
fn test_if_else() {
    let source = r#"
        func sign(n) {
            if (n < 0) { return -1 } else if (n == 0) { return 0 }
            return 1
        }
        return [sign(-5), sign(0), sign(7)]
    "#;
    assert_eq!(eval(source), "[-1, 0, 1]");
}

#[test]
fn test_while_break_continue() {
    let source = r#"
        var i = 0
        var sum = 0
        while (true) {
            i = i + 1
            if (i > 10) { break }
            if (i % 2 == 0) { continue }
            sum = sum + i
        }
        return sum
    "#;
    assert_eq!(eval(source), "25");
}

#[test]
fn test_for_over_ranges_and_lists() {
    assert_eq!(
        eval("var s = 0; for (i in 1...4) { s = s + i }; return s"),
        "10"
    );
    assert_eq!(
        eval("var s = 0; for (i in 0..<4) { s = s + i }; return s"),
        "6"
    );
    assert_eq!(
        eval("var s = 0; for (i in 3..<3) { s = s + 1 }; return s"),
        "0"
    );
    assert_eq!(
        eval("var out = []; for (x in [3, 2, 1]) { out.push(x * 2) }; return out"),
        "[6, 4, 2]"
    );
}

#[test]
fn test_for_over_map_keys_and_string() {
    assert_eq!(
        eval("var s = 0; for (k in [1: \"a\", 2: \"b\", 3: \"c\"]) { s = s + k }; return s"),
        "6"
    );
    assert_eq!(
        eval("var s = \"\"; for (c in \"abc\") { s = c + s }; return s"),
        "cba"
    );
}

#[test]
fn test_for_break_and_continue() {
    let source = r#"
        var seen = []
        for (i in 1...10) {
            if (i == 2) { continue }
            if (i == 5) { break }
            var doubled = i * 2
            seen.push(doubled)
        }
        return seen
    "#;
    assert_eq!(eval(source), "[2, 6, 8]");
}

// ===== 函数与闭包 =====

#[test]
fn test_recursion() {
    let source = r#"
        func fib(n) {
            if (n < 2) { return n }
            return fib(n - 1) + fib(n - 2)
        }
        return fib(15)
    "#;
    assert_eq!(eval(source), "610");
}

#[test]
fn test_missing_arguments_are_null() {
    assert_eq!(eval("func f(a, b) { return b }; return f(1)"), "null");
    assert_eq!(eval("func f(a) { return a }; return f(1, 2, 3)"), "1");
}

#[test]
fn test_closure_counter() {
    let source = r#"
        func make_counter() {
            var count = 0
            return func() {
                count = count + 1
                return count
            }
        }
        var a = make_counter()
        var b = make_counter()
        a()
        a()
        b()
        return [a(), b()]
    "#;
    assert_eq!(eval(source), "[3, 2]");
}

#[test]
fn test_closures_share_captured_variable() {
    let source = r#"
        func pair() {
            var n = 0
            var inc = func() { n = n + 1 }
            var get = func() { return n }
            inc()
            inc()
            return get()
        }
        return pair()
    "#;
    assert_eq!(eval(source), "2");
}

#[test]
fn test_nested_capture_and_local_recursion() {
    let source = r#"
        func outer(x) {
            func fact(n) {
                if (n <= 1) { return 1 }
                return n * fact(n - 1)
            }
            return func() { return func() { return fact(x) } }
        }
        return outer(5)()()
    "#;
    assert_eq!(eval(source), "120");
}

#[test]
fn test_loop_variable_capture_is_per_iteration() {
    let source = r#"
        func collect() {
            var fns = []
            for (i in 1...3) { fns.push(func() { return i }) }
            var out = []
            for (f in fns) { out.push(f()) }
            return out
        }
        return collect()
    "#;
    assert_eq!(eval(source), "[1, 2, 3]");
}

#[test]
fn test_main_runs_after_top_level() {
    let source = r#"
        var base = 40
        func main() { return base + 2 }
    "#;
    assert_eq!(eval(source), "42");
}

// ===== 类 =====

#[test]
fn test_class_init_and_methods() {
    let source = r#"
        class Point {
            var x
            var y
            func init(x0, y0) {
                x = x0
                self.y = y0
            }
            func sum() { return x + y }
        }
        var p = Point(3, 4)
        return [p.sum(), p.x, p.y]
    "#;
    assert_eq!(eval(source), "[7, 3, 4]");
}

#[test]
fn test_ivar_initializers_and_inheritance() {
    let source = r#"
        class Animal {
            var legs = 4
            var sound = "..."
            func speak() { return sound + " x" + legs }
        }
        class Bird : Animal {
            var wings = 2
            func init() { legs = 2; sound = "tweet" }
        }
        var a = Animal()
        var b = Bird()
        return [a.speak(), b.speak(), b.wings]
    "#;
    assert_eq!(eval(source), "[... x4, tweet x2, 2]");
}

#[test]
fn test_unset_ivar_is_null() {
    assert_eq!(eval("class C { var v }; return C().v"), "null");
}

#[test]
fn test_calling_closure_stored_in_field() {
    let source = r#"
        class C { var cb }
        var c = C()
        c.cb = func (a) { return a + 1 }
        var r = c.cb(41)
        return [r, c.cb(1)]
    "#;
    assert_eq!(eval(source), "[42, 2]");
}

#[test]
fn test_methods_capture_self_in_closures() {
    let source = r#"
        class Counter {
            var n = 0
            func incrementer() { return func() { n = n + 1; return self.n } }
        }
        var c = Counter()
        var inc = c.incrementer()
        inc()
        inc()
        return c.n
    "#;
    assert_eq!(eval(source), "2");
}

#[test]
fn test_display_of_objects() {
    assert_eq!(eval("class C {}; return C"), "C");
    assert_eq!(eval("class C {}; return C()"), "instance of C");
    assert_eq!(eval("func f() {}; return f"), "func f");
    assert_eq!(eval("return 1...5"), "1...5");
    assert_eq!(eval("return [:]"), "[:]");
}

// ===== 集合 =====

#[test]
fn test_list_and_map_operations() {
    let source = r#"
        var list = [1, 2, 3]
        list[0] = 10
        list.push(4)
        var last = list.pop()
        var m = ["a": 1]
        m["b"] = 2
        return [list, list[-1], last, list.count, m["b"], m["zzz"], m.count]
    "#;
    assert_eq!(eval(source), "[[10, 2, 3], 3, 4, 3, 2, null, 2]");
}

// ===== 宿主函数 =====

#[test]
fn test_host_print() {
    let result = run_code("print(\"hello\", 1 + 1)\nprint([1, 2])").unwrap();
    assert_eq!(result.output, vec!["hello 2".to_string(), "[1, 2]".to_string()]);
}

#[test]
fn test_host_receives_invoked_closure_first() {
    assert_eq!(eval("return callee() == callee"), "true");
    assert_eq!(eval("var alias = callee\nreturn alias()"), "func callee");
}

#[test]
fn test_host_failure_becomes_runtime_error() {
    let err = eval_err("fail()");
    assert_eq!(err.kind, EngineErrorKind::Runtime);
    assert_eq!(err.message, "host failure");
}

// ===== 运行时错误 =====

#[test]
fn test_runtime_errors_carry_line() {
    let err = eval_err("var a = 1\nvar b = 0\nvar c = a / b");
    assert_eq!(err.kind, EngineErrorKind::Runtime);
    assert_eq!(err.message, "Division by zero");
    assert_eq!(err.position.map(|p| p.line), Some(3));
}

#[test]
fn test_throw() {
    let err = eval_err("func f() {\n throw \"boom \" + 1\n}\nf()");
    assert_eq!(err.message, "boom 1");
    assert_eq!(err.position.map(|p| p.line), Some(2));
}

#[test]
fn test_type_errors() {
    assert!(eval_err("return 1 + null").message.contains("int and null"));
    assert!(eval_err("var x = 3; x()").message.contains("non-callable"));
    assert!(eval_err("return [1][5]").message.contains("out of bounds"));
    assert!(eval_err("class C {}; return C().missing").message.contains("no member 'missing'"));
    assert!(eval_err("class C {}; C().nope = 1").message.contains("no variable 'nope'"));
}

#[test]
fn test_extern_var_without_host_binding() {
    let err = eval_err("extern var answer\nreturn answer");
    assert_eq!(err.message, "Undefined variable 'answer'");
}

#[test]
fn test_stack_overflow() {
    let limits = LimitConfig {
        max_call_depth: 64,
        ..LimitConfig::default()
    };
    let err = run_with(TestHost::default(), "func f(n) { return f(n + 1) }\nf(0)", limits).unwrap_err();
    assert_eq!(err.message, "Stack overflow");
}

#[test]
fn test_compile_errors_are_reported() {
    let err = eval_err("var x = ");
    assert_eq!(err.kind, EngineErrorKind::Syntax);
    let err = eval_err("return missing");
    assert_eq!(err.kind, EngineErrorKind::Semantic);
    assert!(err.message.contains("missing"));
}
