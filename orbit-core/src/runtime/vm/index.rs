//! 索引、成员访问、内建方法与 for-in 迭代

use super::call::Thread;
use super::{RuntimeError, Vm};
use crate::runtime::heap::Heap;
use crate::runtime::object::{FunctionKind, Object};
use crate::runtime::operators::values_equal;
use crate::runtime::value::Value;

/// 负数下标从末尾计数
fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let resolved = if index < 0 { index + len as i64 } else { index };
    (0..len as i64).contains(&resolved).then_some(resolved as usize)
}

fn out_of_bounds(index: i64, len: usize) -> RuntimeError {
    RuntimeError::new(format!("Index out of bounds: {index} (length {len})"))
}

/// 区间中的元素个数（from > to 时为空）
pub(super) fn range_len(from: i64, to: i64) -> i64 {
    if to < from {
        0
    } else {
        to.saturating_sub(from).saturating_add(1)
    }
}

impl Vm {
    /// obj[index]
    pub(super) fn index_get(&self, object: Value, index: Value) -> Result<Value, RuntimeError> {
        let mut heap = self.heap.borrow_mut();
        let Some(r) = object.as_object() else {
            return Err(cannot_index(&heap, object));
        };
        match (heap.get(r), index) {
            (Object::List(items), Value::Int(i)) => normalize_index(i, items.len())
                .map(|at| items[at])
                .ok_or_else(|| out_of_bounds(i, items.len())),
            (Object::Map(entries), key) => Ok(entries.get(&key).copied().unwrap_or(Value::Null)),
            (Object::String(s), Value::Int(i)) => {
                let count = s.chars().count();
                let ch = normalize_index(i, count).and_then(|at| s.chars().nth(at));
                match ch {
                    Some(c) => Ok(Value::Object(heap.intern(c.encode_utf8(&mut [0; 4])))),
                    None => Err(out_of_bounds(i, count)),
                }
            }
            (Object::Range { from, to }, Value::Int(i)) => {
                let len = range_len(*from, *to);
                let from = *from;
                normalize_index(i, len as usize)
                    .map(|at| Value::Int(from + at as i64))
                    .ok_or_else(|| out_of_bounds(i, len as usize))
            }
            (Object::List(_) | Object::String(_) | Object::Range { .. }, other) => Err(RuntimeError::new(format!(
                "Index must be an int, found {}",
                heap.type_name(other)
            ))),
            _ => Err(cannot_index(&heap, object)),
        }
    }

    /// obj[index] = value
    pub(super) fn index_set(&self, object: Value, index: Value, value: Value) -> Result<(), RuntimeError> {
        let mut heap = self.heap.borrow_mut();
        let Some(r) = object.as_object() else {
            return Err(cannot_index(&heap, object));
        };
        match (heap.get_mut(r), index) {
            (Object::List(items), Value::Int(i)) => {
                let len = items.len();
                let at = normalize_index(i, len).ok_or_else(|| out_of_bounds(i, len))?;
                items[at] = value;
                Ok(())
            }
            (Object::Map(entries), key) => {
                entries.insert(key, value);
                Ok(())
            }
            _ => Err(RuntimeError::new(format!(
                "Cannot assign by index to a value of type {}",
                heap.type_name(object)
            ))),
        }
    }

    /// obj.name
    pub(super) fn property_get(&self, object: Value, name: &str) -> Result<Value, RuntimeError> {
        let heap = self.heap.borrow();
        let Some(r) = object.as_object() else {
            return Err(no_member(&heap, object, name));
        };
        match heap.get(r) {
            Object::Instance(instance) => {
                let Some(member) = heap.lookup_member(instance.class, name) else {
                    return Err(no_member(&heap, object, name));
                };
                match ivar_slot(&heap, member) {
                    Some(index) => instance
                        .ivars
                        .get(index as usize)
                        .copied()
                        .ok_or_else(|| stale_slot(name)),
                    None => Ok(member),
                }
            }
            Object::Class(_) => heap
                .lookup_member(r, name)
                .ok_or_else(|| no_member(&heap, object, name)),
            Object::List(items) if name == "count" => Ok(Value::Int(items.len() as i64)),
            Object::Map(entries) if name == "count" => Ok(Value::Int(entries.len() as i64)),
            Object::String(s) if name == "count" => Ok(Value::Int(s.chars().count() as i64)),
            Object::Range { from, to } if name == "count" => Ok(Value::Int(range_len(*from, *to))),
            _ => Err(no_member(&heap, object, name)),
        }
    }

    /// obj.name = value（只能写实例变量）
    pub(super) fn property_set(&self, object: Value, name: &str, value: Value) -> Result<(), RuntimeError> {
        let slot = {
            let heap = self.heap.borrow();
            let instance = object.as_object().and_then(|r| heap.instance(r));
            let Some(instance) = instance else {
                return Err(RuntimeError::new(format!(
                    "Cannot set member '{name}' on a value of type {}",
                    heap.type_name(object)
                )));
            };
            match heap.lookup_member(instance.class, name).and_then(|m| ivar_slot(&heap, m)) {
                Some(slot) => slot,
                None => {
                    let class = heap.class(instance.class).map(|c| c.name.to_string()).unwrap_or_default();
                    return Err(RuntimeError::new(format!(
                        "Instance of {class} has no variable '{name}'"
                    )));
                }
            }
        };
        match object.as_object() {
            Some(r) if self.set_ivar(r, slot, value) => Ok(()),
            _ => Err(stale_slot(name)),
        }
    }

    /// 列表、map、字符串的内建方法；不适用时返回 None
    pub(super) fn builtin_method(
        &self,
        receiver: Value,
        name: &str,
        args: &[Value],
    ) -> Option<Result<Value, RuntimeError>> {
        let r = receiver.as_object()?;
        let mut heap = self.heap.borrow_mut();
        let arg = args.first().copied().unwrap_or(Value::Null);
        let result = match (heap.get_mut(r), name) {
            (Object::List(items), "push") => {
                items.push(arg);
                Ok(Value::Int(items.len() as i64))
            }
            (Object::List(items), "pop") => items
                .pop()
                .ok_or_else(|| RuntimeError::new("pop from empty list")),
            (Object::List(items), "contains") => {
                Ok(Value::Bool(items.iter().any(|v| values_equal(*v, arg))))
            }
            (Object::Map(entries), "has") => Ok(Value::Bool(entries.contains_key(&arg))),
            (Object::Map(entries), "remove") => Ok(entries.remove(&arg).unwrap_or(Value::Null)),
            (Object::Map(entries), "keys") => {
                let keys: Vec<Value> = entries.keys().copied().collect();
                Ok(Value::Object(heap.alloc(Object::List(keys))))
            }
            (Object::String(s), "upper") => {
                let text = s.to_uppercase();
                Ok(Value::Object(heap.intern(&text)))
            }
            (Object::String(s), "lower") => {
                let text = s.to_lowercase();
                Ok(Value::Object(heap.intern(&text)))
            }
            (Object::String(s), "contains") => {
                let s = s.clone();
                match heap.value_str(arg) {
                    Some(needle) => Ok(Value::Bool(s.contains(needle))),
                    None => Err(RuntimeError::new("contains expects a string")),
                }
            }
            _ => return None,
        };
        Some(result)
    }

    /// ForIter：返回下一个元素，迭代结束时返回 None
    ///
    /// map 与字符串在第一次迭代时分别展开为键列表和单字符列表。
    pub(super) fn iterate(&self, thread: &mut Thread, seq_slot: usize) -> Result<Option<Value>, RuntimeError> {
        let index = thread.stack.get(seq_slot + 1).and_then(|v| v.as_int()).unwrap_or(0);
        let sequence = thread.stack.get(seq_slot).copied().unwrap_or(Value::Null);

        let mut heap = self.heap.borrow_mut();
        let Some(r) = sequence.as_object() else {
            return Err(cannot_iterate(&heap, sequence));
        };

        if index == 0 {
            let expanded = match heap.get(r) {
                Object::Map(entries) => Some(entries.keys().copied().collect::<Vec<_>>()),
                Object::String(s) => {
                    let chars: Vec<String> = s.chars().map(String::from).collect();
                    Some(chars.iter().map(|c| Value::Object(heap.intern(c))).collect())
                }
                _ => None,
            };
            if let Some(items) = expanded {
                let list = heap.alloc(Object::List(items));
                thread.stack[seq_slot] = Value::Object(list);
                drop(heap);
                return self.iterate(thread, seq_slot);
            }
        }

        let next = match heap.get(r) {
            Object::List(items) => usize::try_from(index).ok().and_then(|i| items.get(i).copied()),
            Object::Range { from, to } => (index < range_len(*from, *to)).then(|| Value::Int(from + index)),
            _ => return Err(cannot_iterate(&heap, sequence)),
        };
        if next.is_some() {
            thread.stack[seq_slot + 1] = Value::Int(index + 1);
        }
        Ok(next)
    }
}

/// 成员值为实例变量访问器时返回其槽位
fn ivar_slot(heap: &Heap, member: Value) -> Option<u32> {
    match heap.closure_function(member.as_object()?)?.kind {
        FunctionKind::Ivar { index } => Some(index),
        _ => None,
    }
}

fn no_member(heap: &Heap, object: Value, name: &str) -> RuntimeError {
    let owner = match object.as_object().and_then(|r| heap.instance(r)) {
        Some(instance) => match heap.class(instance.class) {
            Some(class) => format!("Instance of {}", class.name),
            None => "Instance".to_string(),
        },
        None => format!("Value of type {}", heap.type_name(object)),
    };
    RuntimeError::new(format!("{owner} has no member '{name}'"))
}

fn stale_slot(name: &str) -> RuntimeError {
    RuntimeError::new(format!("Instance variable '{name}' is outside the instance's storage"))
}

fn cannot_index(heap: &Heap, object: Value) -> RuntimeError {
    RuntimeError::new(format!("Cannot index a value of type {}", heap.type_name(object)))
}

fn cannot_iterate(heap: &Heap, object: Value) -> RuntimeError {
    RuntimeError::new(format!("Cannot iterate over a value of type {}", heap.type_name(object)))
}
