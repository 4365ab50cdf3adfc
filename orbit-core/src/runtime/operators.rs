//! 运算符实现 (add_values, sub_values 等)
//!
//! 错误以 `String` 返回，由虚拟机补充位置后上报。

use super::heap::Heap;
use super::object::Object;
use super::value::Value;
use std::cmp::Ordering;

/// 加法：数字相加；任一侧为字符串时拼接；两个列表相加得到新列表
pub fn add_values(heap: &mut Heap, a: Value, b: Value) -> Result<Value, String> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => return Ok(Value::Int(x.wrapping_add(y))),
        (Value::Float(_) | Value::Int(_), Value::Float(_) | Value::Int(_)) => {
            return Ok(float_op(a, b, |x, y| x + y));
        }
        _ => {}
    }

    if heap.value_str(a).is_some() || heap.value_str(b).is_some() {
        let text = format!("{}{}", heap.display(a), heap.display(b));
        return Ok(Value::Object(heap.intern(&text)));
    }

    if let (Some(ra), Some(rb)) = (a.as_object(), b.as_object()) {
        if let (Object::List(x), Object::List(y)) = (heap.get(ra), heap.get(rb)) {
            let joined: Vec<Value> = x.iter().chain(y.iter()).copied().collect();
            return Ok(Value::Object(heap.alloc(Object::List(joined))));
        }
    }

    Err(binary_type_error(heap, "+", a, b))
}

/// 减法、乘法、除法、取模
pub fn arith_values(heap: &Heap, op: char, a: Value, b: Value) -> Result<Value, String> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => match op {
            '-' => Ok(Value::Int(x.wrapping_sub(y))),
            '*' => Ok(Value::Int(x.wrapping_mul(y))),
            '/' if y == 0 => Err("Division by zero".to_string()),
            '/' => Ok(Value::Int(x.wrapping_div(y))),
            '%' if y == 0 => Err("Modulo by zero".to_string()),
            _ => Ok(Value::Int(x.wrapping_rem(y))),
        },
        (Value::Float(_) | Value::Int(_), Value::Float(_) | Value::Int(_)) => Ok(match op {
            '-' => float_op(a, b, |x, y| x - y),
            '*' => float_op(a, b, |x, y| x * y),
            '/' => float_op(a, b, |x, y| x / y),
            _ => float_op(a, b, |x, y| x % y),
        }),
        _ => Err(binary_type_error(heap, &op.to_string(), a, b)),
    }
}

/// 一元负号
pub fn negate_value(heap: &Heap, a: Value) -> Result<Value, String> {
    match a {
        Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
        Value::Float(f) => Ok(Value::Float(-f)),
        _ => Err(format!("Cannot negate a value of type {}", heap.type_name(a))),
    }
}

/// 相等：int 与 float 按数值比较，其余按值（字符串已驻留）
pub fn values_equal(a: Value, b: Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => (x as f64) == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        _ => a == b,
    }
}

/// 大小比较：数字之间或字符串之间
pub fn compare_values(heap: &Heap, op: &str, a: Value, b: Value) -> Result<bool, String> {
    let ordering = match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(&y)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (x, y) = (a.as_number().unwrap_or(0.0), b.as_number().unwrap_or(0.0));
            x.partial_cmp(&y)
        }
        _ => match (heap.value_str(a), heap.value_str(b)) {
            (Some(x), Some(y)) => Some(x.cmp(y)),
            _ => return Err(binary_type_error(heap, op, a, b)),
        },
    };

    // NaN 参与的比较总是 false
    let Some(ordering) = ordering else {
        return Ok(false);
    };
    Ok(match op {
        "<" => ordering == Ordering::Less,
        "<=" => ordering != Ordering::Greater,
        ">" => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    })
}

fn float_op(a: Value, b: Value, f: impl Fn(f64, f64) -> f64) -> Value {
    Value::Float(f(a.as_number().unwrap_or(0.0), b.as_number().unwrap_or(0.0)))
}

fn binary_type_error(heap: &Heap, op: &str, a: Value, b: Value) -> String {
    format!(
        "Unsupported operand types for {op}: {} and {}",
        heap.type_name(a),
        heap.type_name(b)
    )
}
