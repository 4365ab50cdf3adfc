//! 宿主侧的值
//!
//! [`Value`] 是脚本可见数据的带标签表示。标量直接存放；引用类型携带
//! [`Handle`]（所属 [`Context`] + 堆对象），生命周期绑定到上下文。

use crate::class::Class;
use crate::closure::Closure;
use crate::context::Context;
use crate::error::Error;
use crate::instance::Instance;
use orbit_core::runtime::heap::format_float;
use orbit_core::{Object, ObjectKind, ObjRef};
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::ops::{Range, RangeInclusive};

/// 引擎内部的值
pub(crate) type RawValue = orbit_core::Value;

/// 值的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    /// 非有限浮点数等无法表示的结果
    Undefined,
    Bool,
    Int,
    Float,
    String,
    Range,
    List,
    Map,
    Function,
    Closure,
    Fiber,
    Class,
    Instance,
    Module,
    Upvalue,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Undefined => "undefined",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::Range => "range",
            ValueKind::List => "list",
            ValueKind::Map => "map",
            ValueKind::Function => "function",
            ValueKind::Closure => "closure",
            ValueKind::Fiber => "fiber",
            ValueKind::Class => "class",
            ValueKind::Instance => "instance",
            ValueKind::Module => "module",
            ValueKind::Upvalue => "upvalue",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 指向某个上下文堆中对象的句柄
#[derive(Clone, Copy)]
pub struct Handle<'ctx> {
    pub(crate) ctx: &'ctx Context,
    pub(crate) obj: ObjRef,
}

impl<'ctx> Handle<'ctx> {
    pub(crate) fn new(ctx: &'ctx Context, obj: ObjRef) -> Self {
        Self { ctx, obj }
    }

    pub fn context(&self) -> &'ctx Context {
        self.ctx
    }
}

impl PartialEq for Handle<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.ctx, other.ctx) && self.obj == other.obj
    }
}

impl Eq for Handle<'_> {}

impl Hash for Handle<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.ctx, state);
        self.obj.hash(state);
    }
}

impl fmt::Debug for Handle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.obj.index())
    }
}

/// 脚本可见的值
#[derive(Debug, Clone, Copy, Default)]
pub enum Value<'ctx> {
    #[default]
    Null,
    Undefined,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Handle<'ctx>),
    Range(Handle<'ctx>),
    List(Handle<'ctx>),
    Map(Handle<'ctx>),
    Function(Handle<'ctx>),
    Closure(Handle<'ctx>),
    Fiber(Handle<'ctx>),
    Class(Handle<'ctx>),
    Instance(Handle<'ctx>),
    Module(Handle<'ctx>),
    Upvalue(Handle<'ctx>),
}

impl<'ctx> Value<'ctx> {
    // ==================== 种类 ====================

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Undefined => ValueKind::Undefined,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::String(_) => ValueKind::String,
            Value::Range(_) => ValueKind::Range,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
            Value::Function(_) => ValueKind::Function,
            Value::Closure(_) => ValueKind::Closure,
            Value::Fiber(_) => ValueKind::Fiber,
            Value::Class(_) => ValueKind::Class,
            Value::Instance(_) => ValueKind::Instance,
            Value::Module(_) => ValueKind::Module,
            Value::Upvalue(_) => ValueKind::Upvalue,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// 引用类型的句柄；标量返回 `None`
    pub fn handle(&self) -> Option<Handle<'ctx>> {
        match *self {
            Value::Null | Value::Undefined | Value::Bool(_) | Value::Int(_) | Value::Float(_) => None,
            Value::String(h)
            | Value::Range(h)
            | Value::List(h)
            | Value::Map(h)
            | Value::Function(h)
            | Value::Closure(h)
            | Value::Fiber(h)
            | Value::Class(h)
            | Value::Instance(h)
            | Value::Module(h)
            | Value::Upvalue(h) => Some(h),
        }
    }

    /// 引用类型所属的上下文
    pub fn context(&self) -> Option<&'ctx Context> {
        self.handle().map(|h| h.ctx)
    }

    fn mismatch(&self, expected: ValueKind) -> Error {
        Error::TypeMismatch {
            expected: expected.name(),
            found: self.kind().name(),
        }
    }

    // ==================== 精确访问 ====================

    pub fn get_bool(&self) -> Result<bool, Error> {
        match self {
            Value::Bool(b) => Ok(*b),
            _ => Err(self.mismatch(ValueKind::Bool)),
        }
    }

    pub fn get_int(&self) -> Result<i64, Error> {
        match self {
            Value::Int(n) => Ok(*n),
            _ => Err(self.mismatch(ValueKind::Int)),
        }
    }

    pub fn get_float(&self) -> Result<f64, Error> {
        match self {
            Value::Float(f) => Ok(*f),
            _ => Err(self.mismatch(ValueKind::Float)),
        }
    }

    pub fn get_string(&self) -> Result<String, Error> {
        let Value::String(h) = self else {
            return Err(self.mismatch(ValueKind::String));
        };
        let heap = h.ctx.vm().heap();
        heap.string(h.obj)
            .map(|s| s.to_string())
            .ok_or_else(|| self.mismatch(ValueKind::String))
    }

    pub fn get_list(&self) -> Result<Vec<Value<'ctx>>, Error> {
        let Value::List(h) = self else {
            return Err(self.mismatch(ValueKind::List));
        };
        let items = match h.ctx.vm().heap().get(h.obj) {
            Object::List(items) => items.clone(),
            _ => return Err(self.mismatch(ValueKind::List)),
        };
        Ok(items.into_iter().map(|v| Value::from_raw(h.ctx, v)).collect())
    }

    pub fn get_map(&self) -> Result<HashMap<Value<'ctx>, Value<'ctx>>, Error> {
        let Value::Map(h) = self else {
            return Err(self.mismatch(ValueKind::Map));
        };
        let entries: Vec<(RawValue, RawValue)> = match h.ctx.vm().heap().get(h.obj) {
            Object::Map(entries) => entries.iter().map(|(k, v)| (*k, *v)).collect(),
            _ => return Err(self.mismatch(ValueKind::Map)),
        };
        Ok(entries
            .into_iter()
            .map(|(k, v)| (Value::from_raw(h.ctx, k), Value::from_raw(h.ctx, v)))
            .collect())
    }

    /// 区间（闭区间；`to < from` 表示空区间）
    pub fn get_range(&self) -> Result<RangeInclusive<i64>, Error> {
        let Value::Range(h) = self else {
            return Err(self.mismatch(ValueKind::Range));
        };
        match h.ctx.vm().heap().get(h.obj) {
            Object::Range { from, to } => Ok(*from..=*to),
            _ => Err(self.mismatch(ValueKind::Range)),
        }
    }

    pub fn get_closure(&self) -> Result<Closure<'ctx>, Error> {
        match self {
            Value::Closure(h) => Ok(Closure::new(h.ctx, h.obj, None)),
            _ => Err(self.mismatch(ValueKind::Closure)),
        }
    }

    pub fn get_instance(&self) -> Result<Instance<'ctx>, Error> {
        match self {
            Value::Instance(h) => Ok(Instance::new(h.ctx, h.obj)),
            _ => Err(self.mismatch(ValueKind::Instance)),
        }
    }

    pub fn get_class(&self) -> Result<Class<'ctx>, Error> {
        match self {
            Value::Class(h) => Ok(Class::new(h.ctx, h.obj)),
            _ => Err(self.mismatch(ValueKind::Class)),
        }
    }

    // ==================== 宽松转换 ====================

    /// int 原样返回，float 向零截断，字符串尝试解析；其余为 `None`
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Value::String(_) => self.get_string().ok()?.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(f) => Some(*f as f32),
            Value::Int(n) => Some(*n as f32),
            Value::String(_) => self
                .get_string()
                .ok()?
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|f| f.is_finite()),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            Value::String(_) => self
                .get_string()
                .ok()?
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite()),
            _ => None,
        }
    }

    /// 任意值的文本形式；字符串返回其内容
    pub fn as_string(&self) -> String {
        self.to_string()
    }

    // ==================== 与引擎值互转 ====================

    pub(crate) fn from_raw(ctx: &'ctx Context, raw: RawValue) -> Self {
        match raw {
            RawValue::Null => Value::Null,
            RawValue::Undefined => Value::Undefined,
            RawValue::Bool(b) => Value::Bool(b),
            RawValue::Int(n) => Value::Int(n),
            RawValue::Float(f) => Value::from(f),
            RawValue::Object(obj) => {
                let h = Handle::new(ctx, obj);
                match ctx.vm().kind_of(raw) {
                    Some(ObjectKind::String) => Value::String(h),
                    Some(ObjectKind::Range) => Value::Range(h),
                    Some(ObjectKind::List) => Value::List(h),
                    Some(ObjectKind::Map) => Value::Map(h),
                    Some(ObjectKind::Function) => Value::Function(h),
                    Some(ObjectKind::Closure) => Value::Closure(h),
                    Some(ObjectKind::Fiber) => Value::Fiber(h),
                    Some(ObjectKind::Class) => Value::Class(h),
                    Some(ObjectKind::Instance) => Value::Instance(h),
                    Some(ObjectKind::Module) => Value::Module(h),
                    Some(ObjectKind::Upvalue) => Value::Upvalue(h),
                    None => Value::Null,
                }
            }
        }
    }

    /// 转成 `ctx` 中的引擎值；属于其他上下文的引用返回 [`Error::ForeignValue`]
    pub(crate) fn to_raw(&self, ctx: &Context) -> Result<RawValue, Error> {
        Ok(match *self {
            Value::Null => RawValue::Null,
            Value::Undefined => RawValue::Undefined,
            Value::Bool(b) => RawValue::Bool(b),
            Value::Int(n) => RawValue::Int(n),
            Value::Float(f) => RawValue::Float(f),
            _ => match self.handle() {
                Some(h) if std::ptr::eq(h.ctx, ctx) => RawValue::Object(h.obj),
                _ => return Err(Error::ForeignValue),
            },
        })
    }
}

// ==================== 相等与哈希 ====================

// 比较标签与原始负载：浮点按位比较，引用比较上下文与对象
impl PartialEq for Value<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Undefined, Value::Undefined) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            _ => self.kind() == other.kind() && self.handle().is_some() && self.handle() == other.handle(),
        }
    }
}

impl Eq for Value<'_> {}

impl Hash for Value<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        match self {
            Value::Null | Value::Undefined => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            _ => self.handle().hash(state),
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Undefined => f.write_str("undefined"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => f.write_str(&format_float(*x)),
            _ => match self.handle() {
                Some(h) => f.write_str(&h.ctx.vm().display(RawValue::Object(h.obj))),
                None => f.write_str(self.kind().name()),
            },
        }
    }
}

// ==================== 标量构造 ====================

impl From<bool> for Value<'_> {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value<'_> {
            fn from(n: $t) -> Self {
                Value::Int(i64::from(n))
            }
        })*
    };
}

// 超出 i64 的部分饱和到边界
macro_rules! impl_from_wide_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value<'_> {
            fn from(n: $t) -> Self {
                Value::Int(i64::try_from(n).unwrap_or(if n > 0 { i64::MAX } else { i64::MIN }))
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);
impl_from_wide_int!(isize, usize, u64, i128, u128);

impl From<f64> for Value<'_> {
    /// 非有限值得到 [`Value::Undefined`]
    fn from(f: f64) -> Self {
        if f.is_finite() {
            Value::Float(f)
        } else {
            Value::Undefined
        }
    }
}

impl From<f32> for Value<'_> {
    fn from(f: f32) -> Self {
        Value::from(f64::from(f))
    }
}

// ==================== IntoValue / FromValue ====================

/// 可以在某个上下文中变成 [`Value`] 的宿主类型
pub trait IntoValue<'ctx> {
    fn into_value(self, ctx: &'ctx Context) -> Result<Value<'ctx>, Error>;
}

impl<'ctx> IntoValue<'ctx> for Value<'ctx> {
    fn into_value(self, _ctx: &'ctx Context) -> Result<Value<'ctx>, Error> {
        Ok(self)
    }
}

macro_rules! impl_into_value_scalar {
    ($($t:ty),*) => {
        $(impl<'ctx> IntoValue<'ctx> for $t {
            fn into_value(self, _ctx: &'ctx Context) -> Result<Value<'ctx>, Error> {
                Ok(Value::from(self))
            }
        })*
    };
}

impl_into_value_scalar!(bool, i8, i16, i32, i64, u8, u16, u32, isize, usize, u64, i128, u128, f32, f64);

impl<'ctx> IntoValue<'ctx> for () {
    fn into_value(self, _ctx: &'ctx Context) -> Result<Value<'ctx>, Error> {
        Ok(Value::Null)
    }
}

impl<'ctx> IntoValue<'ctx> for &str {
    fn into_value(self, ctx: &'ctx Context) -> Result<Value<'ctx>, Error> {
        Ok(ctx.string(self))
    }
}

impl<'ctx> IntoValue<'ctx> for String {
    fn into_value(self, ctx: &'ctx Context) -> Result<Value<'ctx>, Error> {
        Ok(ctx.string(&self))
    }
}

impl<'ctx> IntoValue<'ctx> for RangeInclusive<i64> {
    fn into_value(self, ctx: &'ctx Context) -> Result<Value<'ctx>, Error> {
        Ok(ctx.range(self))
    }
}

impl<'ctx> IntoValue<'ctx> for Range<i64> {
    /// 半开区间转为闭区间 `start..=end-1`
    fn into_value(self, ctx: &'ctx Context) -> Result<Value<'ctx>, Error> {
        Ok(ctx.range(self.start..=self.end.saturating_sub(1)))
    }
}

impl<'ctx, T: IntoValue<'ctx>> IntoValue<'ctx> for Option<T> {
    fn into_value(self, ctx: &'ctx Context) -> Result<Value<'ctx>, Error> {
        match self {
            Some(v) => v.into_value(ctx),
            None => Ok(Value::Null),
        }
    }
}

impl<'ctx, T: IntoValue<'ctx>> IntoValue<'ctx> for Vec<T> {
    fn into_value(self, ctx: &'ctx Context) -> Result<Value<'ctx>, Error> {
        let items = self
            .into_iter()
            .map(|item| item.into_value(ctx))
            .collect::<Result<Vec<_>, _>>()?;
        ctx.list(items)
    }
}

impl<'ctx, K, V, S> IntoValue<'ctx> for HashMap<K, V, S>
where
    K: IntoValue<'ctx>,
    V: IntoValue<'ctx>,
    S: BuildHasher,
{
    fn into_value(self, ctx: &'ctx Context) -> Result<Value<'ctx>, Error> {
        let mut entries = HashMap::with_capacity(self.len());
        for (k, v) in self {
            entries.insert(k.into_value(ctx)?, v.into_value(ctx)?);
        }
        ctx.map(entries)
    }
}

impl<'ctx> IntoValue<'ctx> for Closure<'ctx> {
    fn into_value(self, _ctx: &'ctx Context) -> Result<Value<'ctx>, Error> {
        Ok(self.value())
    }
}

impl<'ctx> IntoValue<'ctx> for Class<'ctx> {
    fn into_value(self, _ctx: &'ctx Context) -> Result<Value<'ctx>, Error> {
        Ok(self.value())
    }
}

impl<'ctx> IntoValue<'ctx> for Instance<'ctx> {
    fn into_value(self, _ctx: &'ctx Context) -> Result<Value<'ctx>, Error> {
        Ok(self.value())
    }
}

/// 可以从 [`Value`] 取出的宿主类型
pub trait FromValue<'ctx>: Sized {
    fn from_value(value: Value<'ctx>) -> Result<Self, Error>;
}

impl<'ctx> FromValue<'ctx> for Value<'ctx> {
    fn from_value(value: Value<'ctx>) -> Result<Self, Error> {
        Ok(value)
    }
}

impl<'ctx> FromValue<'ctx> for bool {
    fn from_value(value: Value<'ctx>) -> Result<Self, Error> {
        value.get_bool()
    }
}

impl<'ctx> FromValue<'ctx> for i64 {
    fn from_value(value: Value<'ctx>) -> Result<Self, Error> {
        value.get_int()
    }
}

impl<'ctx> FromValue<'ctx> for i32 {
    fn from_value(value: Value<'ctx>) -> Result<Self, Error> {
        i32::try_from(value.get_int()?).map_err(|_| Error::TypeMismatch {
            expected: "i32",
            found: "int",
        })
    }
}

impl<'ctx> FromValue<'ctx> for f64 {
    fn from_value(value: Value<'ctx>) -> Result<Self, Error> {
        value.as_double().ok_or(Error::TypeMismatch {
            expected: "float",
            found: value.kind().name(),
        })
    }
}

impl<'ctx> FromValue<'ctx> for f32 {
    fn from_value(value: Value<'ctx>) -> Result<Self, Error> {
        value.as_float().ok_or(Error::TypeMismatch {
            expected: "float",
            found: value.kind().name(),
        })
    }
}

impl<'ctx> FromValue<'ctx> for String {
    fn from_value(value: Value<'ctx>) -> Result<Self, Error> {
        value.get_string()
    }
}

impl<'ctx> FromValue<'ctx> for Vec<Value<'ctx>> {
    fn from_value(value: Value<'ctx>) -> Result<Self, Error> {
        value.get_list()
    }
}

impl<'ctx> FromValue<'ctx> for HashMap<Value<'ctx>, Value<'ctx>> {
    fn from_value(value: Value<'ctx>) -> Result<Self, Error> {
        value.get_map()
    }
}

impl<'ctx> FromValue<'ctx> for RangeInclusive<i64> {
    fn from_value(value: Value<'ctx>) -> Result<Self, Error> {
        value.get_range()
    }
}

impl<'ctx> FromValue<'ctx> for Closure<'ctx> {
    fn from_value(value: Value<'ctx>) -> Result<Self, Error> {
        value.get_closure()
    }
}

impl<'ctx> FromValue<'ctx> for Class<'ctx> {
    fn from_value(value: Value<'ctx>) -> Result<Self, Error> {
        value.get_class()
    }
}

impl<'ctx> FromValue<'ctx> for Instance<'ctx> {
    fn from_value(value: Value<'ctx>) -> Result<Self, Error> {
        value.get_instance()
    }
}

impl<'ctx, T: FromValue<'ctx>> FromValue<'ctx> for Option<T> {
    fn from_value(value: Value<'ctx>) -> Result<Self, Error> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_kinds() {
        assert_eq!(Value::from(true).kind(), ValueKind::Bool);
        assert_eq!(Value::from(7u8).kind(), ValueKind::Int);
        assert_eq!(Value::from(1.5f32).kind(), ValueKind::Float);
        assert_eq!(Value::default().kind(), ValueKind::Null);
    }

    #[test]
    fn test_non_finite_float_is_undefined() {
        assert!(Value::from(f64::NAN).is_undefined());
        assert!(Value::from(f32::INFINITY).is_undefined());
        assert!(Value::from(f64::NEG_INFINITY).is_undefined());
    }

    #[test]
    fn test_wide_integers_saturate() {
        assert_eq!(Value::from(u64::MAX), Value::Int(i64::MAX));
        assert_eq!(Value::from(i128::MIN), Value::Int(i64::MIN));
        assert_eq!(Value::from(42usize), Value::Int(42));
    }

    #[test]
    fn test_lenient_numeric_conversions() {
        assert_eq!(Value::Float(-2.9).as_int(), Some(-2));
        assert_eq!(Value::Int(3).as_double(), Some(3.0));
        assert_eq!(Value::Int(3).as_float(), Some(3.0f32));
        assert_eq!(Value::Bool(true).as_int(), None);
        assert_eq!(Value::Null.as_double(), None);
    }

    #[test]
    fn test_exact_accessor_mismatch() {
        let err = Value::Int(1).get_bool().unwrap_err();
        assert_eq!(
            err,
            Error::TypeMismatch {
                expected: "bool",
                found: "int"
            }
        );
    }

    #[test]
    fn test_equality_is_tag_sensitive() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Float(0.5), Value::Float(0.5));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
        assert_ne!(Value::Null, Value::Undefined);
    }

    #[test]
    fn test_scalar_display() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(Value::Int(-4).to_string(), "-4");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Undefined.as_string(), "undefined");
    }
}
