//! 执行上下文
//!
//! [`Context`] 拥有一个虚拟机实例，以及围绕它的宿主状态：入口闭包、
//! 错误槽、源码加载器和注册的宿主函数。对外的每个调用都在边界处
//! 清空并检查错误槽。

use crate::bridge::Bridge;
use crate::class::Class;
use crate::closure::Closure;
use crate::config::RunConfig;
use crate::error::{Error, LookupError};
use crate::instance::Instance;
use crate::loader::{SourceLoader, ROOT_FILE_ID};
use crate::value::{FromValue, IntoValue, RawValue, Value};
use orbit_core::{Compiler, Delegate, EngineError, EngineErrorKind, ObjRef, Vm};
use orbit_vfs::VirtualFileSystem;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info};

/// 宿主函数：`(context, args)`，参数不含引擎传入的闭包本身
pub(crate) type HostFunction = Rc<dyn for<'c> Fn(&'c Context, &[Value<'c>]) -> Result<Value<'c>, Error>>;

/// 宿主方法：`(context, receiver, args)`
pub(crate) type HostMethod = Rc<dyn for<'c> Fn(&'c Context, Value<'c>, &[Value<'c>]) -> Result<Value<'c>, Error>>;

/// 基于路径的编译结束时清除基准目录
struct BaseDirGuard<'a>(&'a RefCell<SourceLoader>);

impl Drop for BaseDirGuard<'_> {
    fn drop(&mut self) {
        self.0.borrow_mut().clear_base_dir();
    }
}

pub struct Context {
    vm: Vm,
    config: RunConfig,
    entry: Cell<Option<ObjRef>>,
    did_run_main: Cell<bool>,
    recent_error: RefCell<Option<Error>>,
    loader: RefCell<SourceLoader>,
    functions: RefCell<HashMap<String, HostFunction>>,
    methods: RefCell<HashMap<ObjRef, HashMap<String, HostMethod>>>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("vm", &self.vm)
            .field("config", &self.config)
            .field("compiled", &self.entry.get().is_some())
            .field("did_run_main", &self.did_run_main.get())
            .field("functions", &self.functions.borrow().len())
            .finish()
    }
}

/// 两个上下文相等当且仅当它们是同一个引擎实例
impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(&self.vm, &other.vm)
    }
}

impl Context {
    // ==================== 构造 ====================

    pub fn new() -> Self {
        Self::with_config(RunConfig::default())
    }

    pub fn with_config(config: RunConfig) -> Self {
        Self::with_loader(config, SourceLoader::default())
    }

    /// 使用指定的文件系统加载 include
    pub fn with_file_system(config: RunConfig, fs: impl VirtualFileSystem + 'static) -> Self {
        Self::with_loader(config, SourceLoader::new(fs))
    }

    fn with_loader(config: RunConfig, loader: SourceLoader) -> Self {
        debug!(target: "orbit::api", limits = ?config.limits, "Creating context");
        Self {
            vm: Vm::new(config.limits.clone()),
            config,
            entry: Cell::new(None),
            did_run_main: Cell::new(false),
            recent_error: RefCell::new(None),
            loader: RefCell::new(loader),
            functions: RefCell::new(HashMap::new()),
            methods: RefCell::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    // ==================== 编译与执行 ====================

    /// 编译源码，返回入口闭包
    ///
    /// `debug` 显式控制是否生成行号表；`None` 时按配置和构建模式决定。
    /// 无论成功与否，之前的入口和 main 运行状态都会被清除。
    pub fn compile(&self, source: &str, debug: Option<bool>) -> Result<Closure<'_>, Error> {
        self.reset_entry();
        self.compile_source(source, debug)
    }

    /// 从路径编译：根文件记为文件 0，include 相对于它所在的目录解析
    pub fn compile_file(&self, path: impl AsRef<Path>, debug: Option<bool>) -> Result<Closure<'_>, Error> {
        self.reset_entry();
        let _guard = BaseDirGuard(&self.loader);
        let source = self.loader.borrow_mut().open_root(path.as_ref())?;
        self.compile_source(&source, debug)
    }

    fn reset_entry(&self) {
        self.entry.set(None);
        self.did_run_main.set(false);
    }

    fn compile_source(&self, source: &str, debug: Option<bool>) -> Result<Closure<'_>, Error> {
        self.take_error();
        let debug_info = self.config.compiler.debug_info(debug);

        let bridge = Bridge::new(self);
        let mut compiler = Compiler::new(&bridge);
        for name in self.vm.global_names() {
            compiler.declare_global(name);
        }

        let Some(program) = compiler.run(source, ROOT_FILE_ID, debug_info) else {
            let err = self.take_error().unwrap_or_else(|| Error::Compile {
                message: "Failed to compile".to_string(),
                file: None,
                line: None,
                column: None,
            });
            debug!(target: "orbit::api", error = %err, "Compilation failed");
            return Err(err);
        };

        if self.config.dump_bytecode || self.config.compiler.dump_bytecode {
            debug!(target: "orbit::compiler", "Bytecode:\n{}", program.disassemble());
        }

        let entry = self.vm.transfer(&program);
        self.entry.set(Some(entry));
        info!(target: "orbit::api", files = program.files.len(), debug = debug_info, "Script compiled");
        Ok(Closure::new(self, entry, None))
    }

    /// 执行入口（顶层代码，然后是 `main()`），返回结果寄存器
    pub fn run_main(&self) -> Result<Value<'_>, Error> {
        let entry = self.entry.get().ok_or(Error::NoEntryPoint)?;
        let result = self.execute(|vm, delegate| vm.run_main(entry, delegate))?;
        self.did_run_main.set(true);
        info!(target: "orbit::api", "Main finished");
        Ok(result)
    }

    pub fn did_run_main(&self) -> bool {
        self.did_run_main.get()
    }

    /// 进入引擎执行一次，并在边界处检查错误槽
    pub(crate) fn execute<F>(&self, run: F) -> Result<Value<'_>, Error>
    where
        F: FnOnce(&Vm, &dyn Delegate) -> bool,
    {
        self.take_error();
        let bridge = Bridge::new(self);
        let ok = run(&self.vm, &bridge);
        if let Some(err) = self.take_error() {
            return Err(err);
        }
        if !ok {
            return Err(Error::Runtime {
                message: "Execution failed".to_string(),
                file: None,
                line: None,
            });
        }
        Ok(Value::from_raw(self, self.vm.result()))
    }

    // ==================== 顶层变量 ====================

    /// 读取顶层变量；未绑定的名字为 null
    pub fn get_var(&self, name: &str) -> Result<Value<'_>, Error> {
        if !self.did_run_main.get() {
            return Err(Error::MainNotRun);
        }
        Ok(self
            .vm
            .get_value(name)
            .map(|v| Value::from_raw(self, v))
            .unwrap_or(Value::Null))
    }

    /// 读取并转换为宿主类型
    pub fn get_var_as<'c, T: FromValue<'c>>(&'c self, name: &str) -> Result<T, Error> {
        T::from_value(self.get_var(name)?)
    }

    /// 绑定顶层变量（编译前后都可以）
    pub fn set_var<'c>(&'c self, name: &str, value: impl IntoValue<'c>) -> Result<(), Error> {
        let raw = value.into_value(self)?.to_raw(self)?;
        self.vm.set_value(name, raw);
        Ok(())
    }

    // ==================== 函数 ====================

    /// 注册宿主函数；同名注册会替换之前的绑定
    pub fn set_func<F>(&self, name: &str, function: F)
    where
        F: for<'c> Fn(&'c Context, &[Value<'c>]) -> Result<Value<'c>, Error> + 'static,
    {
        let closure = self.vm.new_bridged_closure(name, None);
        self.vm.set_value(name, RawValue::Object(closure));
        self.functions
            .borrow_mut()
            .insert(name.to_string(), Rc::new(function));
        debug!(target: "orbit::api", function = name, "Registered host function");
    }

    /// 注册没有返回值的宿主函数（脚本看到 null）
    pub fn set_func_void<F>(&self, name: &str, function: F)
    where
        F: for<'c> Fn(&'c Context, &[Value<'c>]) + 'static,
    {
        self.set_func(name, move |ctx, args| {
            function(ctx, args);
            Ok(Value::Null)
        });
    }

    pub fn get_func(&self, name: &str) -> Result<Closure<'_>, Error> {
        match self.get_var(name)? {
            Value::Closure(h) => Ok(Closure::new(self, h.obj, None)),
            Value::Null => Err(LookupError::NotFound {
                kind: "Closure",
                name: name.to_string(),
            }
            .into()),
            other => Err(LookupError::WrongType {
                kind: "Closure",
                name: name.to_string(),
                found: other.kind().name(),
            }
            .into()),
        }
    }

    pub fn run_func<'c>(&'c self, name: &str, args: &[Value<'c>]) -> Result<Value<'c>, Error> {
        self.get_func(name)?.run(args)
    }

    // ==================== 类与实例 ====================

    /// 定义类并立即绑定到同名顶层变量
    pub fn create_class(&self, name: &str, superclass: Option<&Class<'_>>) -> Result<Class<'_>, Error> {
        let superclass = match superclass {
            Some(s) if !std::ptr::eq(s.context(), self) => return Err(Error::ForeignValue),
            Some(s) => Some(s.obj()),
            None => None,
        };
        let class = self.vm.new_class(name, superclass).map_err(|e| Error::Runtime {
            message: e.message,
            file: None,
            line: None,
        })?;
        self.vm.set_value(name, RawValue::Object(class));
        debug!(target: "orbit::api", class = name, "Created class");
        Ok(Class::new(self, class))
    }

    /// 把类绑定到另一个名字
    pub fn set_class<'c>(&'c self, name: &str, class: &Class<'c>) -> Result<(), Error> {
        self.set_var(name, class.value())
    }

    pub fn get_instance(&self, name: &str) -> Result<Instance<'_>, Error> {
        match self.get_var(name)? {
            Value::Instance(h) => Ok(Instance::new(self, h.obj)),
            Value::Null => Err(LookupError::NotFound {
                kind: "Instance",
                name: name.to_string(),
            }
            .into()),
            other => Err(LookupError::WrongType {
                kind: "Instance",
                name: name.to_string(),
                found: other.kind().name(),
            }
            .into()),
        }
    }

    // ==================== 值构造 ====================

    /// 字符串会被驻留：内容相同的字符串是同一个值
    pub fn string(&self, text: &str) -> Value<'_> {
        Value::from_raw(self, self.vm.intern(text))
    }

    pub fn list<'c>(&'c self, items: Vec<Value<'c>>) -> Result<Value<'c>, Error> {
        let items = items
            .iter()
            .map(|v| v.to_raw(self))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::from_raw(self, self.vm.new_list(items)))
    }

    pub fn map<'c>(&'c self, entries: HashMap<Value<'c>, Value<'c>>) -> Result<Value<'c>, Error> {
        let mut raw = HashMap::with_capacity(entries.len());
        for (k, v) in &entries {
            raw.insert(k.to_raw(self)?, v.to_raw(self)?);
        }
        Ok(Value::from_raw(self, self.vm.new_map(raw)))
    }

    pub fn range(&self, range: RangeInclusive<i64>) -> Value<'_> {
        Value::from_raw(self, self.vm.new_range(*range.start(), *range.end()))
    }

    /// 任意宿主值 → [`Value`]
    pub fn create_value<'c, T: IntoValue<'c>>(&'c self, value: T) -> Result<Value<'c>, Error> {
        value.into_value(self)
    }

    // ==================== 源码文件 ====================

    /// 此上下文的编译是否加载过该文件
    pub fn compiled_source_included(&self, name: &str) -> bool {
        self.loader.borrow().contains(name)
    }

    pub fn loaded_files(&self) -> Vec<(u32, String)> {
        self.loader.borrow().loaded_files()
    }

    pub fn filename(&self, file_id: u32) -> Option<String> {
        self.loader.borrow().filename(file_id).map(str::to_string)
    }

    // ==================== crate 内部 ====================

    pub(crate) fn vm(&self) -> &Vm {
        &self.vm
    }

    pub(crate) fn loader(&self) -> &RefCell<SourceLoader> {
        &self.loader
    }

    pub(crate) fn error_slot(&self) -> &RefCell<Option<Error>> {
        &self.recent_error
    }

    pub(crate) fn take_error(&self) -> Option<Error> {
        self.recent_error.borrow_mut().take()
    }

    pub(crate) fn host_function(&self, name: &str) -> Option<HostFunction> {
        self.functions.borrow().get(name).cloned()
    }

    pub(crate) fn host_method(&self, class: ObjRef, name: &str) -> Option<HostMethod> {
        self.methods.borrow().get(&class)?.get(name).cloned()
    }

    pub(crate) fn register_method(&self, class: ObjRef, name: &str, method: HostMethod) {
        self.methods
            .borrow_mut()
            .entry(class)
            .or_default()
            .insert(name.to_string(), method);
    }

    pub(crate) fn convert_engine_error(&self, error: EngineError) -> Error {
        let position = error.position;
        let file = position.and_then(|p| self.filename(p.file_id));
        let line = position.map(|p| p.line);
        match error.kind {
            EngineErrorKind::Syntax | EngineErrorKind::Semantic => Error::Compile {
                message: error.message,
                file,
                line,
                column: position.map(|p| p.column),
            },
            EngineErrorKind::Io => Error::Load {
                message: error.message,
                file,
                line,
            },
            EngineErrorKind::Runtime => Error::Runtime {
                message: error.message,
                file,
                line,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contexts_compare_by_identity() {
        let a = Context::new();
        let b = Context::new();
        assert!(a == a);
        assert!(a != b);
    }

    #[test]
    fn test_run_main_without_compile() {
        let ctx = Context::new();
        assert_eq!(ctx.run_main().unwrap_err(), Error::NoEntryPoint);
    }

    #[test]
    fn test_get_var_before_run_main() {
        let ctx = Context::new();
        ctx.compile("var x = 1", None).unwrap();
        assert_eq!(ctx.get_var("x").unwrap_err(), Error::MainNotRun);
        ctx.run_main().unwrap();
        assert_eq!(ctx.get_var("x").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_failed_compile_clears_entry() {
        let ctx = Context::new();
        ctx.compile("var x = 1", None).unwrap();
        assert!(ctx.compile("var = ", None).is_err());
        assert_eq!(ctx.run_main().unwrap_err(), Error::NoEntryPoint);
    }

    #[test]
    fn test_unbound_name_is_null() {
        let ctx = Context::new();
        ctx.compile("", None).unwrap();
        ctx.run_main().unwrap();
        assert!(ctx.get_var("nothing").unwrap().is_null());
    }

    #[test]
    fn test_re_registering_replaces_function() {
        let ctx = Context::new();
        ctx.set_func("answer", |_, _| Ok(Value::Int(1)));
        ctx.set_func("answer", |_, _| Ok(Value::Int(2)));
        ctx.compile("var got = answer()", None).unwrap();
        ctx.run_main().unwrap();
        assert_eq!(ctx.get_var("got").unwrap(), Value::Int(2));
    }
}
