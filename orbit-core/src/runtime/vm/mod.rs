//! 虚拟机实现
//!
//! 所有方法都只需要 `&self`：堆、全局表和结果寄存器放在 `RefCell`/`Cell` 里，
//! 宿主函数在执行过程中可以重新进入虚拟机（创建值、调用脚本函数）。
//! 每次从宿主进入虚拟机都会创建独立的 [`Thread`](call::Thread)，
//! 脚本之间的调用在同一个 Thread 内压帧，不占用 Rust 调用栈。

mod call;
mod execution;
mod index;

use super::bytecode::IVAR_INITIALIZER;
use super::delegate::{Delegate, EngineError, EngineErrorKind, SourcePosition};
use super::heap::{Heap, ObjRef};
use super::object::{ClassObj, ClosureObj, FunctionKind, FunctionObj, InstanceObj, Object, ObjectKind};
use super::session::Program;
use super::value::Value;
use orbit_config::LimitConfig;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;
use tracing::debug;

/// 运行时错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}{}", .position.map(|p| format!(" (line {})", p.line)).unwrap_or_default())]
pub struct RuntimeError {
    pub message: String,
    /// 出错指令的位置（编译时没有生成调试信息则为 None）
    pub position: Option<SourcePosition>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
        }
    }
}

impl From<String> for RuntimeError {
    fn from(message: String) -> Self {
        RuntimeError::new(message)
    }
}

impl From<RuntimeError> for EngineError {
    fn from(err: RuntimeError) -> Self {
        EngineError {
            kind: EngineErrorKind::Runtime,
            message: err.message,
            position: err.position,
        }
    }
}

/// 虚拟机
pub struct Vm {
    heap: RefCell<Heap>,
    globals: RefCell<HashMap<Rc<str>, Value>>,
    /// 最近一次成功执行的结果
    result: Cell<Value>,
    /// 当前所有 Thread 的调用帧总数
    depth: Cell<usize>,
    limits: LimitConfig,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new(LimitConfig::default())
    }
}

impl fmt::Debug for Vm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vm")
            .field("objects", &self.heap.borrow().len())
            .field("globals", &self.globals.borrow().len())
            .field("limits", &self.limits)
            .finish()
    }
}

impl Vm {
    pub fn new(limits: LimitConfig) -> Self {
        Self {
            heap: RefCell::new(Heap::new()),
            globals: RefCell::new(HashMap::new()),
            result: Cell::new(Value::Null),
            depth: Cell::new(0),
            limits,
        }
    }

    pub fn limits(&self) -> &LimitConfig {
        &self.limits
    }

    // ==================== 执行入口 ====================

    /// 把编译好的程序装入虚拟机，返回入口闭包
    pub fn transfer(&self, program: &Program) -> ObjRef {
        let mut heap = self.heap.borrow_mut();
        let function = heap.alloc(Object::Function(FunctionObj {
            name: program.entry.name.clone(),
            kind: FunctionKind::Script(program.entry.clone()),
            owner: None,
        }));
        heap.alloc(Object::Closure(ClosureObj {
            function,
            upvalues: Rc::from(Vec::new()),
        }))
    }

    /// 执行入口闭包（顶层代码），若定义了全局 `main` 函数再执行它
    ///
    /// 出错时把错误交给 delegate 并返回 false。
    pub fn run_main(&self, entry: ObjRef, delegate: &dyn Delegate) -> bool {
        let outcome = self.call(Value::Object(entry), Value::Null, &[], delegate).and_then(|value| {
            let main = self
                .get_value("main")
                .and_then(Value::as_object)
                .filter(|r| self.heap().closure(*r).is_some());
            match main {
                Some(r) => {
                    debug!(target: "orbit::vm", "Running main()");
                    self.call(Value::Object(r), Value::Null, &[], delegate)
                }
                None => Ok(value),
            }
        });
        self.finish(outcome, delegate)
    }

    /// 以 `receiver` 为 self 调用闭包
    pub fn run_closure(&self, closure: ObjRef, receiver: Value, args: &[Value], delegate: &dyn Delegate) -> bool {
        let outcome = self.call(Value::Object(closure), receiver, args, delegate);
        self.finish(outcome, delegate)
    }

    fn finish(&self, outcome: Result<Value, RuntimeError>, delegate: &dyn Delegate) -> bool {
        match outcome {
            Ok(value) => {
                self.result.set(value);
                true
            }
            Err(err) => {
                debug!(target: "orbit::vm", error = %err, "Runtime error");
                delegate.report_error(err.into());
                false
            }
        }
    }

    /// 结果寄存器
    pub fn result(&self) -> Value {
        self.result.get()
    }

    // ==================== 全局变量 ====================

    pub fn get_value(&self, name: &str) -> Option<Value> {
        self.globals.borrow().get(name).copied()
    }

    pub fn set_value(&self, name: &str, value: Value) {
        self.globals.borrow_mut().insert(Rc::from(name), value);
    }

    /// 所有全局变量名
    pub fn global_names(&self) -> Vec<String> {
        self.globals.borrow().keys().map(|k| k.to_string()).collect()
    }

    // ==================== 堆访问 ====================

    pub fn heap(&self) -> Ref<'_, Heap> {
        self.heap.borrow()
    }

    pub fn heap_mut(&self) -> RefMut<'_, Heap> {
        self.heap.borrow_mut()
    }

    pub fn intern(&self, text: &str) -> Value {
        Value::Object(self.heap.borrow_mut().intern(text))
    }

    pub fn new_list(&self, items: Vec<Value>) -> Value {
        Value::Object(self.heap.borrow_mut().alloc(Object::List(items)))
    }

    pub fn new_map(&self, entries: HashMap<Value, Value>) -> Value {
        Value::Object(self.heap.borrow_mut().alloc(Object::Map(entries)))
    }

    /// 闭区间 `from...to`
    pub fn new_range(&self, from: i64, to: i64) -> Value {
        Value::Object(self.heap.borrow_mut().alloc(Object::Range { from, to }))
    }

    pub fn display(&self, value: Value) -> String {
        self.heap.borrow().display(value)
    }

    /// 引用类型的对象种类
    pub fn kind_of(&self, value: Value) -> Option<ObjectKind> {
        let heap = self.heap.borrow();
        value.as_object().filter(|r| heap.contains(*r)).map(|r| heap.kind(r))
    }

    // ==================== 类与实例 ====================

    /// 创建类。父类必须是类对象
    pub fn new_class(&self, name: &str, superclass: Option<ObjRef>) -> Result<ObjRef, RuntimeError> {
        let mut heap = self.heap.borrow_mut();
        let nivars = match superclass {
            Some(s) => match heap.class_mut(s) {
                Some(class) => {
                    class.subclassed = true;
                    class.nivars
                }
                None => return Err(RuntimeError::new(format!("Superclass of {name} must be a class"))),
            },
            None => 0,
        };
        Ok(heap.alloc(Object::Class(ClassObj {
            name: Rc::from(name),
            superclass,
            members: HashMap::new(),
            nivars,
            subclassed: false,
        })))
    }

    /// 创建实例，所有实例变量为 null（不执行初始化方法）
    pub fn new_instance(&self, class: ObjRef) -> Option<ObjRef> {
        let mut heap = self.heap.borrow_mut();
        let nivars = heap.class(class)?.nivars as usize;
        Some(heap.alloc(Object::Instance(InstanceObj {
            class,
            ivars: vec![Value::Null; nivars],
        })))
    }

    /// 读取实例变量槽位；槽位超出实例分配的范围返回 None
    pub fn get_ivar(&self, instance: ObjRef, slot: u32) -> Option<Value> {
        self.heap.borrow().instance(instance)?.ivars.get(slot as usize).copied()
    }

    /// 写入实例变量槽位；槽位超出范围返回 false
    pub fn set_ivar(&self, instance: ObjRef, slot: u32, value: Value) -> bool {
        let mut heap = self.heap.borrow_mut();
        match heap.instance_mut(instance).and_then(|i| i.ivars.get_mut(slot as usize)) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    /// 给类添加实例变量，返回分配的槽位
    ///
    /// 之后创建的实例才有这个槽位。子类的槽位从父类的总数之后开始编号，
    /// 所以已有子类的类返回 None。
    pub fn class_add_ivar(&self, class: ObjRef, name: &str) -> Option<u32> {
        let mut heap = self.heap.borrow_mut();
        let class_obj = heap.class(class)?;
        if class_obj.subclassed {
            return None;
        }
        let index = class_obj.nivars;
        let function = heap.alloc(Object::Function(FunctionObj {
            name: Rc::from(name),
            kind: FunctionKind::Ivar { index },
            owner: Some(class),
        }));
        let closure = heap.alloc(Object::Closure(ClosureObj {
            function,
            upvalues: Rc::from(Vec::new()),
        }));
        let class_obj = heap.class_mut(class)?;
        class_obj.members.insert(Rc::from(name), Value::Object(closure));
        class_obj.nivars += 1;
        Some(index)
    }

    /// 设置类成员（方法）
    pub fn class_set_member(&self, class: ObjRef, name: &str, value: Value) -> bool {
        match self.heap.borrow_mut().class_mut(class) {
            Some(c) => {
                c.members.insert(Rc::from(name), value);
                true
            }
            None => false,
        }
    }

    /// 沿父类链查找成员
    pub fn lookup_member(&self, class: ObjRef, name: &str) -> Option<Value> {
        self.heap.borrow().lookup_member(class, name)
    }

    pub fn class_of(&self, instance: ObjRef) -> Option<ObjRef> {
        self.heap.borrow().instance(instance).map(|i| i.class)
    }

    pub fn superclass_of(&self, class: ObjRef) -> Option<ObjRef> {
        self.heap.borrow().class(class)?.superclass
    }

    pub fn class_name(&self, class: ObjRef) -> Option<Rc<str>> {
        self.heap.borrow().class(class).map(|c| c.name.clone())
    }

    // ==================== 闭包 ====================

    /// 创建由宿主实现的闭包，调用时转给 `Delegate::bridge_execute`
    pub fn new_bridged_closure(&self, name: &str, owner: Option<ObjRef>) -> ObjRef {
        let mut heap = self.heap.borrow_mut();
        let function = heap.alloc(Object::Function(FunctionObj {
            name: Rc::from(name),
            kind: FunctionKind::Bridged,
            owner,
        }));
        heap.alloc(Object::Closure(ClosureObj {
            function,
            upvalues: Rc::from(Vec::new()),
        }))
    }

    /// 闭包对应函数的名字和所属类
    pub fn function_info(&self, closure: ObjRef) -> Option<(Rc<str>, Option<ObjRef>)> {
        self.heap
            .borrow()
            .closure_function(closure)
            .map(|f| (f.name.clone(), f.owner))
    }

    /// 实例变量访问器闭包的槽位
    pub fn ivar_index(&self, closure: ObjRef) -> Option<u32> {
        match self.heap.borrow().closure_function(closure)?.kind {
            FunctionKind::Ivar { index } => Some(index),
            _ => None,
        }
    }

    /// 类自身（不含父类）的实例变量初始化方法
    fn own_initializer(&self, class: ObjRef) -> Option<Value> {
        self.heap.borrow().class(class)?.members.get(IVAR_INITIALIZER).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_globals() {
        let vm = Vm::default();
        assert_eq!(vm.get_value("x"), None);
        vm.set_value("x", Value::Int(3));
        assert_eq!(vm.get_value("x"), Some(Value::Int(3)));
        assert_eq!(vm.global_names(), vec!["x".to_string()]);
    }

    #[test]
    fn test_class_ivars_and_instances() {
        let vm = Vm::default();
        let base = vm.new_class("Base", None).unwrap();
        assert_eq!(vm.class_add_ivar(base, "a"), Some(0));
        let derived = vm.new_class("Derived", Some(base)).unwrap();
        assert_eq!(vm.class_add_ivar(derived, "b"), Some(1));

        let instance = vm.new_instance(derived).unwrap();
        assert_eq!(vm.get_ivar(instance, 1), Some(Value::Null));
        assert!(vm.set_ivar(instance, 1, Value::Int(5)));
        assert_eq!(vm.get_ivar(instance, 1), Some(Value::Int(5)));
        assert!(!vm.set_ivar(instance, 2, Value::Int(5)));

        let accessor = vm.lookup_member(derived, "a").and_then(Value::as_object).unwrap();
        assert_eq!(vm.ivar_index(accessor), Some(0));
        assert_eq!(vm.class_of(instance), Some(derived));
        assert_eq!(vm.superclass_of(derived), Some(base));
        // 父类的布局已被子类继承
        assert_eq!(vm.class_add_ivar(base, "c"), None);
        assert_eq!(vm.class_add_ivar(derived, "d"), Some(2));
        assert_eq!(vm.class_name(derived).as_deref(), Some("Derived"));
    }

    #[test]
    fn test_superclass_must_be_class() {
        let vm = Vm::default();
        let not_class = vm.new_bridged_closure("f", None);
        assert!(vm.new_class("Bad", Some(not_class)).is_err());
    }

    #[test]
    fn test_bridged_closure_info() {
        let vm = Vm::default();
        let class = vm.new_class("C", None).unwrap();
        let closure = vm.new_bridged_closure("greet", Some(class));
        let (name, owner) = vm.function_info(closure).unwrap();
        assert_eq!(&*name, "greet");
        assert_eq!(owner, Some(class));
        assert_eq!(vm.ivar_index(closure), None);
    }
}
