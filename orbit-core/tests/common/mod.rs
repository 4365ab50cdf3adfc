//! 测试辅助工具
//!
//! 提供端到端测试的辅助函数：编译 + 执行，宿主提供 `print`

#![allow(dead_code)]

use orbit_core::{Compiler, Delegate, EngineError, LoadedFile, ObjRef, Value, Vm};
use orbit_core::LimitConfig;
use std::cell::RefCell;
use std::collections::HashMap;

/// 记录错误与输出的宿主
#[derive(Default)]
pub struct TestHost {
    pub errors: RefCell<Vec<EngineError>>,
    pub output: RefCell<Vec<String>>,
    pub files: HashMap<String, (String, u32)>,
}

impl TestHost {
    pub fn with_file(mut self, name: &str, source: &str, file_id: u32) -> Self {
        self.files.insert(name.to_string(), (source.to_string(), file_id));
        self
    }
}

impl Delegate for TestHost {
    fn report_error(&self, error: EngineError) {
        self.errors.borrow_mut().push(error);
    }

    fn load_file(&self, name: &str) -> Option<LoadedFile> {
        self.files.get(name).map(|(source, file_id)| LoadedFile {
            source: source.clone(),
            file_id: *file_id,
        })
    }

    fn bridge_execute(&self, vm: &Vm, closure: ObjRef, args: &[Value]) -> Result<Value, String> {
        let (name, _) = vm.function_info(closure).ok_or("unknown closure")?;
        match &*name {
            "print" => {
                let line: Vec<String> = args[1..].iter().map(|v| vm.display(*v)).collect();
                self.output.borrow_mut().push(line.join(" "));
                Ok(Value::Null)
            }
            "fail" => Err("host failure".to_string()),
            // 第一个参数是被调用的闭包本身
            "callee" => Ok(args[0]),
            other => Err(format!("no host function {other}")),
        }
    }
}

/// 执行结果
#[derive(Debug)]
pub struct ExecResult {
    /// 结果寄存器的显示文本
    pub value: String,
    /// print 输出的行
    pub output: Vec<String>,
}

/// 编译并执行源码
pub fn run_code(source: &str) -> Result<ExecResult, EngineError> {
    run_with(TestHost::default(), source, LimitConfig::default())
}

pub fn run_with(host: TestHost, source: &str, limits: LimitConfig) -> Result<ExecResult, EngineError> {
    let vm = Vm::new(limits);
    for name in ["print", "fail", "callee"] {
        let closure = vm.new_bridged_closure(name, None);
        vm.set_value(name, Value::Object(closure));
    }

    let mut compiler = Compiler::new(&host);
    for name in vm.global_names() {
        compiler.declare_global(name);
    }
    let program = compiler.run(source, 0, true);
    let ok = match program {
        Some(program) => {
            let entry = vm.transfer(&program);
            vm.run_main(entry, &host)
        }
        None => false,
    };

    if !ok {
        let error = host.errors.borrow_mut().pop();
        return Err(error.unwrap_or_else(|| EngineError::new(orbit_core::EngineErrorKind::Runtime, "unknown failure")));
    }
    Ok(ExecResult {
        value: vm.display(vm.result()),
        output: host.output.take(),
    })
}

/// 执行并返回结果的显示文本
pub fn eval(source: &str) -> String {
    match run_code(source) {
        Ok(result) => result.value,
        Err(e) => panic!("script failed: {e}\n{source}"),
    }
}

/// 执行并返回错误信息
pub fn eval_err(source: &str) -> EngineError {
    match run_code(source) {
        Ok(result) => panic!("expected failure, got {}", result.value),
        Err(e) => e,
    }
}
