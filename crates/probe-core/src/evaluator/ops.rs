// Operators, comparison and indexing on runtime values.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::ast::BinaryOp;

use super::errors::EvaluatorError;
use super::value::Value;

type OpResult = Result<Value, EvaluatorError>;

pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> OpResult {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => arithmetic(op, left, right, i64::checked_sub, |a, b| a - b),
        BinaryOp::Mul => multiply(left, right),
        BinaryOp::Div => divide(left, right),
        BinaryOp::FloorDiv => floor_divide(left, right),
        BinaryOp::Mod => modulo(left, right),
        BinaryOp::Eq => Ok(Value::Bool(left == right)),
        BinaryOp::Ne => Ok(Value::Bool(left != right)),
        BinaryOp::Lt => Ok(Value::Bool(compare(op, left, right)? == Ordering::Less)),
        BinaryOp::Le => Ok(Value::Bool(compare(op, left, right)? != Ordering::Greater)),
        BinaryOp::Gt => Ok(Value::Bool(compare(op, left, right)? == Ordering::Greater)),
        BinaryOp::Ge => Ok(Value::Bool(compare(op, left, right)? != Ordering::Less)),
        BinaryOp::In => contains(right, left).map(Value::Bool),
    }
}

fn mismatch(op: BinaryOp, left: &Value, right: &Value) -> EvaluatorError {
    EvaluatorError::binary_type_error(op.symbol(), left.type_name(), right.type_name())
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn arithmetic(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> OpResult {
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        return int_op(*a, *b)
            .map(Value::Int)
            .ok_or_else(|| EvaluatorError::overflow(op.symbol()));
    }
    match (as_float(left), as_float(right)) {
        (Some(a), Some(b)) => Ok(Value::Float(float_op(a, b))),
        _ => Err(mismatch(op, left, right)),
    }
}

fn add(left: &Value, right: &Value) -> OpResult {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        _ => arithmetic(BinaryOp::Add, left, right, i64::checked_add, |a, b| a + b),
    }
}

fn repeat_count(count: i64) -> usize {
    usize::try_from(count).unwrap_or(0)
}

fn multiply(left: &Value, right: &Value) -> OpResult {
    match (left, right) {
        (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
            Ok(Value::Str(s.repeat(repeat_count(*n))))
        }
        (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items)) => {
            let items = items.borrow();
            let mut out = Vec::with_capacity(items.len() * repeat_count(*n));
            for _ in 0..repeat_count(*n) {
                out.extend(items.iter().cloned());
            }
            Ok(Value::list(out))
        }
        _ => arithmetic(BinaryOp::Mul, left, right, i64::checked_mul, |a, b| a * b),
    }
}

fn divide(left: &Value, right: &Value) -> OpResult {
    match (as_float(left), as_float(right)) {
        (Some(_), Some(b)) if b == 0.0 => Err(EvaluatorError::DivisionByZero),
        (Some(a), Some(b)) => Ok(Value::Float(a / b)),
        _ => Err(mismatch(BinaryOp::Div, left, right)),
    }
}

fn floor_divide(left: &Value, right: &Value) -> OpResult {
    match (left, right) {
        (Value::Int(_), Value::Int(0)) => Err(EvaluatorError::DivisionByZero),
        (Value::Int(a), Value::Int(b)) => {
            let quotient = a
                .checked_div(*b)
                .ok_or_else(|| EvaluatorError::overflow("//"))?;
            // Round towards negative infinity
            if a % b != 0 && (*a < 0) != (*b < 0) {
                Ok(Value::Int(quotient - 1))
            } else {
                Ok(Value::Int(quotient))
            }
        }
        _ => match (as_float(left), as_float(right)) {
            (Some(_), Some(b)) if b == 0.0 => Err(EvaluatorError::DivisionByZero),
            (Some(a), Some(b)) => Ok(Value::Float((a / b).floor())),
            _ => Err(mismatch(BinaryOp::FloorDiv, left, right)),
        },
    }
}

fn modulo(left: &Value, right: &Value) -> OpResult {
    match (left, right) {
        (Value::Int(_), Value::Int(0)) => Err(EvaluatorError::DivisionByZero),
        (Value::Int(a), Value::Int(b)) => {
            let rem = a
                .checked_rem(*b)
                .ok_or_else(|| EvaluatorError::overflow("%"))?;
            // The result takes the sign of the divisor
            if rem != 0 && (rem < 0) != (*b < 0) {
                Ok(Value::Int(rem + b))
            } else {
                Ok(Value::Int(rem))
            }
        }
        _ => match (as_float(left), as_float(right)) {
            (Some(_), Some(b)) if b == 0.0 => Err(EvaluatorError::DivisionByZero),
            (Some(a), Some(b)) => Ok(Value::Float(a - b * (a / b).floor())),
            _ => Err(mismatch(BinaryOp::Mod, left, right)),
        },
    }
}

/// Ordering for `<`, `sorted`, `min` and friends. Numbers compare with
/// numbers, strings with strings, lists element-wise.
pub fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Ordering, EvaluatorError> {
    let mut seen = Vec::new();
    compare_in(op, left, right, &mut seen)
}

// Pairs of lists already being compared; meeting one again orders equal.
fn compare_in(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    seen: &mut Vec<(*const (), *const ())>,
) -> Result<Ordering, EvaluatorError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
        (Value::List(a), Value::List(b)) => {
            let pair = (Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ());
            if pair.0 == pair.1 || seen.contains(&pair) {
                return Ok(Ordering::Equal);
            }
            seen.push(pair);
            let ordering = compare_items(op, &a.borrow(), &b.borrow(), seen);
            seen.pop();
            ordering
        }
        _ => match (as_float(left), as_float(right)) {
            (Some(a), Some(b)) => a
                .partial_cmp(&b)
                .ok_or_else(|| EvaluatorError::invalid("cannot order NaN")),
            _ => Err(mismatch(op, left, right)),
        },
    }
}

fn compare_items(
    op: BinaryOp,
    a: &[Value],
    b: &[Value],
    seen: &mut Vec<(*const (), *const ())>,
) -> Result<Ordering, EvaluatorError> {
    for (x, y) in a.iter().zip(b.iter()) {
        match compare_in(op, x, y, seen)? {
            Ordering::Equal => continue,
            other => return Ok(other),
        }
    }
    Ok(a.len().cmp(&b.len()))
}

/// `needle in haystack`
pub fn contains(haystack: &Value, needle: &Value) -> Result<bool, EvaluatorError> {
    match (haystack, needle) {
        (Value::List(items), _) => Ok(items.borrow().iter().any(|item| item == needle)),
        (Value::Map(entries), Value::Str(key)) => Ok(entries.borrow().contains_key(key)),
        (Value::Map(_), _) => Ok(false),
        (Value::Str(s), Value::Str(sub)) => Ok(s.contains(sub.as_str())),
        _ => Err(mismatch(BinaryOp::In, needle, haystack)),
    }
}

/// Resolve a possibly negative index against `len`.
pub fn resolve_index(index: i64, len: usize) -> Result<usize, EvaluatorError> {
    let resolved = if index < 0 {
        i64::try_from(len).ok().and_then(|len| len.checked_add(index))
    } else {
        Some(index)
    };
    resolved
        .and_then(|i| usize::try_from(i).ok())
        .filter(|&i| i < len)
        .ok_or(EvaluatorError::IndexOutOfRange { index, len })
}

fn map_key(index: &Value) -> Result<&str, EvaluatorError> {
    match index {
        Value::Str(key) => Ok(key),
        other => Err(EvaluatorError::unary_type_error(
            "map key",
            "str",
            other.type_name(),
        )),
    }
}

/// `object[index]`
pub fn get_index(object: &Value, index: &Value) -> OpResult {
    match (object, index) {
        (Value::List(items), Value::Int(i)) => {
            let items = items.borrow();
            let at = resolve_index(*i, items.len())?;
            Ok(items[at].clone())
        }
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            let at = resolve_index(*i, chars.len())?;
            Ok(Value::Str(chars[at].to_string()))
        }
        (Value::Map(entries), key) => {
            let key = map_key(key)?;
            entries
                .borrow()
                .get(key)
                .cloned()
                .ok_or_else(|| EvaluatorError::KeyNotFound {
                    key: key.to_string(),
                })
        }
        (Value::List(_) | Value::Str(_), other) => Err(EvaluatorError::unary_type_error(
            "index",
            "int",
            other.type_name(),
        )),
        (other, _) => Err(EvaluatorError::unary_type_error(
            "index",
            "list, str or map",
            other.type_name(),
        )),
    }
}

/// `object[index] = value`
pub fn set_index(object: &Value, index: &Value, value: Value) -> Result<(), EvaluatorError> {
    match (object, index) {
        (Value::List(items), Value::Int(i)) => {
            let mut items = items.borrow_mut();
            let at = resolve_index(*i, items.len())?;
            items[at] = value;
            Ok(())
        }
        (Value::Map(entries), key) => {
            let key = map_key(key)?.to_string();
            entries.borrow_mut().insert(key, value);
            Ok(())
        }
        (Value::List(_), other) => Err(EvaluatorError::unary_type_error(
            "index assignment",
            "int",
            other.type_name(),
        )),
        (other, _) => Err(EvaluatorError::unary_type_error(
            "index assignment",
            "list or map",
            other.type_name(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_division_and_modulo_round_down() {
        let cases = [(7, 2, 3, 1), (-7, 2, -4, 1), (7, -2, -4, -1), (-7, -2, 3, -1)];
        for (a, b, q, r) in cases {
            assert_eq!(
                binary(BinaryOp::FloorDiv, &Value::Int(a), &Value::Int(b)).unwrap(),
                Value::Int(q),
                "{a} // {b}"
            );
            assert_eq!(
                binary(BinaryOp::Mod, &Value::Int(a), &Value::Int(b)).unwrap(),
                Value::Int(r),
                "{a} % {b}"
            );
        }
    }

    #[test]
    fn test_division_is_true_division() {
        assert_eq!(
            binary(BinaryOp::Div, &Value::Int(7), &Value::Int(2)).unwrap(),
            Value::Float(3.5)
        );
        assert_eq!(
            binary(BinaryOp::Div, &Value::Int(1), &Value::Float(0.0)),
            Err(EvaluatorError::DivisionByZero)
        );
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert!(matches!(
            binary(BinaryOp::Add, &Value::Int(i64::MAX), &Value::Int(1)),
            Err(EvaluatorError::Overflow { .. })
        ));
        assert!(matches!(
            binary(BinaryOp::FloorDiv, &Value::Int(i64::MIN), &Value::Int(-1)),
            Err(EvaluatorError::Overflow { .. })
        ));
    }

    #[test]
    fn test_mixed_type_errors() {
        assert_eq!(
            binary(BinaryOp::Sub, &Value::str("a"), &Value::Int(1)),
            Err(EvaluatorError::binary_type_error("-", "str", "int"))
        );
        assert!(binary(BinaryOp::Lt, &Value::str("a"), &Value::Int(1)).is_err());
    }

    #[test]
    fn test_negative_indexing() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(get_index(&list, &Value::Int(-1)).unwrap(), Value::Int(3));
        assert_eq!(
            get_index(&list, &Value::Int(3)),
            Err(EvaluatorError::IndexOutOfRange { index: 3, len: 3 })
        );
        set_index(&list, &Value::Int(-3), Value::Int(9)).unwrap();
        assert_eq!(get_index(&list, &Value::Int(0)).unwrap(), Value::Int(9));
    }

    #[test]
    fn test_membership() {
        let list = Value::list(vec![Value::Int(1), Value::str("x")]);
        assert!(contains(&list, &Value::Float(1.0)).unwrap());
        assert!(!contains(&list, &Value::str("y")).unwrap());
        assert!(contains(&Value::str("hello"), &Value::str("ell")).unwrap());
    }
}
