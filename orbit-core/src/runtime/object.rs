//! 堆对象定义

use super::bytecode::Proto;
use super::heap::ObjRef;
use super::value::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// 堆对象
#[derive(Debug, Clone)]
pub enum Object {
    String(Rc<str>),
    List(Vec<Value>),
    Map(HashMap<Value, Value>),
    /// 闭区间 `from...to`（`a..<b` 在构造时转换为 `a...b-1`）
    Range { from: i64, to: i64 },
    Function(FunctionObj),
    Closure(ClosureObj),
    Class(ClassObj),
    Instance(InstanceObj),
    /// 被闭包捕获的变量单元
    Upvalue(Value),
}

/// 对象种类标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    String,
    List,
    Map,
    Range,
    Function,
    Closure,
    /// 保留：当前引擎不会创建协程对象
    Fiber,
    Class,
    Instance,
    /// 保留：当前引擎不会创建模块对象
    Module,
    Upvalue,
}

impl ObjectKind {
    pub fn name(self) -> &'static str {
        match self {
            ObjectKind::String => "string",
            ObjectKind::List => "list",
            ObjectKind::Map => "map",
            ObjectKind::Range => "range",
            ObjectKind::Function => "function",
            ObjectKind::Closure => "closure",
            ObjectKind::Fiber => "fiber",
            ObjectKind::Class => "class",
            ObjectKind::Instance => "instance",
            ObjectKind::Module => "module",
            ObjectKind::Upvalue => "upvalue",
        }
    }
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::String(_) => ObjectKind::String,
            Object::List(_) => ObjectKind::List,
            Object::Map(_) => ObjectKind::Map,
            Object::Range { .. } => ObjectKind::Range,
            Object::Function(_) => ObjectKind::Function,
            Object::Closure(_) => ObjectKind::Closure,
            Object::Class(_) => ObjectKind::Class,
            Object::Instance(_) => ObjectKind::Instance,
            Object::Upvalue(_) => ObjectKind::Upvalue,
        }
    }
}

/// 函数对象
#[derive(Debug, Clone)]
pub struct FunctionObj {
    pub name: Rc<str>,
    pub kind: FunctionKind,
    /// 声明该函数的类（方法才有）
    pub owner: Option<ObjRef>,
}

#[derive(Debug, Clone)]
pub enum FunctionKind {
    /// 脚本编译出的函数
    Script(Rc<Proto>),
    /// 由宿主实现，调用时转给 `Delegate::bridge_execute`
    Bridged,
    /// 实例变量访问器：无参调用读取，带一个参数调用写入
    Ivar { index: u32 },
}

/// 闭包：函数 + 捕获的变量单元
#[derive(Debug, Clone)]
pub struct ClosureObj {
    pub function: ObjRef,
    pub upvalues: Rc<[ObjRef]>,
}

/// 类对象
#[derive(Debug, Clone)]
pub struct ClassObj {
    pub name: Rc<str>,
    pub superclass: Option<ObjRef>,
    /// 成员表：名字 → 闭包（方法或实例变量访问器）
    pub members: HashMap<Rc<str>, Value>,
    /// 实例变量总数（含继承的）
    pub nivars: u32,
    /// 已有子类时槽位布局固定，不能再添加实例变量
    pub subclassed: bool,
}

/// 实例对象
#[derive(Debug, Clone)]
pub struct InstanceObj {
    pub class: ObjRef,
    pub ivars: Vec<Value>,
}
