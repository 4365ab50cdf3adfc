//! 引擎内部的值表示
//!
//! 标量直接存放，引用类型通过 [`ObjRef`] 指向 [`Heap`](super::heap::Heap)。
//! `Value` 是 `Copy` 的，可以自由地在栈、全局表和对象之间传递。

use super::heap::ObjRef;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy)]
pub enum Value {
    Null,
    /// 非法数值转换的结果（例如非有限浮点数）
    Undefined,
    Bool(bool),
    Int(i64),
    Float(f64),
    Object(ObjRef),
}

impl Value {
    /// 只有 null、false 和 undefined 为假
    pub fn is_falsey(self) -> bool {
        matches!(self, Value::Null | Value::Undefined | Value::Bool(false))
    }

    pub fn is_null(self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(self) -> Option<ObjRef> {
        match self {
            Value::Object(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_int(self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(n),
            _ => None,
        }
    }

    /// 数字（int 或 float）统一为 f64
    pub fn as_number(self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(n as f64),
            Value::Float(f) => Some(f),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

// 浮点数按位比较，保证 Eq/Hash 一致（可作为 map 的 key）
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Undefined, Value::Undefined) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null | Value::Undefined => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Object(r) => r.hash(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_truthiness() {
        assert!(Value::Null.is_falsey());
        assert!(Value::Undefined.is_falsey());
        assert!(Value::Bool(false).is_falsey());
        assert!(!Value::Int(0).is_falsey());
        assert!(!Value::Float(0.0).is_falsey());
    }

    #[test]
    fn test_float_keys_are_bitwise() {
        let mut map = HashMap::new();
        map.insert(Value::Float(f64::NAN), 1);
        assert_eq!(map.get(&Value::Float(f64::NAN)), Some(&1));
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }
}
