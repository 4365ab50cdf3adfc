//! 对象堆
//!
//! 所有引用类型对象都存放在一个按索引寻址的竞技场里，不做回收：
//! 对象的生命周期与所属 VM 相同。字符串在这里驻留，
//! 内容相同的字符串总是同一个 [`ObjRef`]。

use super::object::{ClassObj, ClosureObj, FunctionObj, InstanceObj, Object, ObjectKind};
use super::value::Value;
use std::collections::HashMap;
use std::fmt::Write;
use std::rc::Rc;

/// 堆对象引用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef(u32);

impl ObjRef {
    /// 在堆中的下标
    pub fn index(self) -> u32 {
        self.0
    }
}

/// 嵌套容器显示的最大深度
const DISPLAY_DEPTH: usize = 16;

#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<Object>,
    strings: HashMap<Rc<str>, ObjRef>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 分配对象（字符串请使用 [`Heap::intern`]）
    pub fn alloc(&mut self, object: Object) -> ObjRef {
        let r = ObjRef(self.objects.len() as u32);
        self.objects.push(object);
        r
    }

    /// 驻留字符串
    pub fn intern(&mut self, text: &str) -> ObjRef {
        if let Some(r) = self.strings.get(text) {
            return *r;
        }
        let text: Rc<str> = Rc::from(text);
        let r = self.alloc(Object::String(text.clone()));
        self.strings.insert(text, r);
        r
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, r: ObjRef) -> bool {
        (r.0 as usize) < self.objects.len()
    }

    pub fn get(&self, r: ObjRef) -> &Object {
        &self.objects[r.0 as usize]
    }

    pub fn get_mut(&mut self, r: ObjRef) -> &mut Object {
        &mut self.objects[r.0 as usize]
    }

    // ==================== 类型化访问 ====================

    pub fn string(&self, r: ObjRef) -> Option<&Rc<str>> {
        match self.get(r) {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// 值为字符串时返回其内容
    pub fn value_str(&self, value: Value) -> Option<&str> {
        value.as_object().and_then(|r| self.string(r)).map(|s| &**s)
    }

    pub fn function(&self, r: ObjRef) -> Option<&FunctionObj> {
        match self.get(r) {
            Object::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn closure(&self, r: ObjRef) -> Option<&ClosureObj> {
        match self.get(r) {
            Object::Closure(c) => Some(c),
            _ => None,
        }
    }

    /// 闭包对应的函数对象
    pub fn closure_function(&self, r: ObjRef) -> Option<&FunctionObj> {
        self.closure(r).and_then(|c| self.function(c.function))
    }

    pub fn class(&self, r: ObjRef) -> Option<&ClassObj> {
        match self.get(r) {
            Object::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn class_mut(&mut self, r: ObjRef) -> Option<&mut ClassObj> {
        match self.get_mut(r) {
            Object::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn instance(&self, r: ObjRef) -> Option<&InstanceObj> {
        match self.get(r) {
            Object::Instance(i) => Some(i),
            _ => None,
        }
    }

    pub fn instance_mut(&mut self, r: ObjRef) -> Option<&mut InstanceObj> {
        match self.get_mut(r) {
            Object::Instance(i) => Some(i),
            _ => None,
        }
    }

    /// 沿父类链查找成员
    pub fn lookup_member(&self, class: ObjRef, name: &str) -> Option<Value> {
        let mut current = Some(class);
        while let Some(r) = current {
            let class = self.class(r)?;
            if let Some(v) = class.members.get(name) {
                return Some(*v);
            }
            current = class.superclass;
        }
        None
    }

    /// 对象种类
    pub fn kind(&self, r: ObjRef) -> ObjectKind {
        self.get(r).kind()
    }

    /// 值的类型名（用于错误信息）
    pub fn type_name(&self, value: Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Undefined => "undefined",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Object(r) => self.kind(r).name(),
        }
    }

    // ==================== 显示 ====================

    /// 与脚本中的字符串化规则一致
    pub fn display(&self, value: Value) -> String {
        let mut out = String::new();
        self.write_value(&mut out, value, 0);
        out
    }

    fn write_value(&self, out: &mut String, value: Value, depth: usize) {
        match value {
            Value::Null => out.push_str("null"),
            Value::Undefined => out.push_str("undefined"),
            Value::Bool(b) => {
                let _ = write!(out, "{b}");
            }
            Value::Int(n) => {
                let _ = write!(out, "{n}");
            }
            Value::Float(f) => out.push_str(&format_float(f)),
            Value::Object(r) => self.write_object(out, r, depth),
        }
    }

    fn write_object(&self, out: &mut String, r: ObjRef, depth: usize) {
        if depth > DISPLAY_DEPTH {
            out.push_str("...");
            return;
        }
        match self.get(r) {
            Object::String(s) => out.push_str(s),
            Object::Range { from, to } => {
                let _ = write!(out, "{from}...{to}");
            }
            Object::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_value(out, *item, depth + 1);
                }
                out.push(']');
            }
            Object::Map(entries) => {
                if entries.is_empty() {
                    out.push_str("[:]");
                    return;
                }
                out.push('[');
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_value(out, *k, depth + 1);
                    out.push_str(": ");
                    self.write_value(out, *v, depth + 1);
                }
                out.push(']');
            }
            Object::Function(f) => {
                let _ = write!(out, "func {}", f.name);
            }
            Object::Closure(c) => match self.function(c.function) {
                Some(f) if !f.name.is_empty() => {
                    let _ = write!(out, "func {}", f.name);
                }
                _ => out.push_str("func"),
            },
            Object::Class(c) => out.push_str(&c.name),
            Object::Instance(i) => match self.class(i.class) {
                Some(c) => {
                    let _ = write!(out, "instance of {}", c.name);
                }
                None => out.push_str("instance"),
            },
            Object::Upvalue(v) => self.write_value(out, *v, depth + 1),
        }
    }
}

/// 整数值的浮点数保留 `.0`
pub fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}
