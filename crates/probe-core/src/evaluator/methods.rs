// Methods on lists, maps and strings.
//
// List and map methods mutate the receiver in place; the rewriter relies on
// that when it reports a modifier call's receiver after the call returns.

use indexmap::IndexMap;

use super::builtins::sort_values;
use super::errors::EvaluatorError;
use super::ops::resolve_index;
use super::value::{ListRef, MapRef, Value};

type MethodResult = Result<Value, EvaluatorError>;

pub fn call(receiver: &Value, method: &str, args: Vec<Value>) -> MethodResult {
    match receiver {
        Value::List(items) => list_method(items, method, args),
        Value::Map(entries) => map_method(entries, method, args),
        Value::Str(s) => str_method(s, method, args),
        other => Err(not_found(other, method)),
    }
}

fn not_found(receiver: &Value, method: &str) -> EvaluatorError {
    EvaluatorError::MethodNotFound {
        type_name: receiver.type_name().to_string(),
        method: method.to_string(),
    }
}

fn arity(method: &str, args: &[Value], min: usize, max: usize) -> Result<(), EvaluatorError> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let expected = if min == max {
        min.to_string()
    } else {
        format!("{min} to {max}")
    };
    Err(EvaluatorError::arity(method, expected, args.len()))
}

fn expect_int(method: &str, value: &Value) -> Result<i64, EvaluatorError> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(EvaluatorError::unary_type_error(method, "int", other.type_name())),
    }
}

fn expect_str<'v>(method: &str, value: &'v Value) -> Result<&'v str, EvaluatorError> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(EvaluatorError::unary_type_error(method, "str", other.type_name())),
    }
}

fn count_value(n: usize) -> Value {
    Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

fn list_method(items: &ListRef, method: &str, args: Vec<Value>) -> MethodResult {
    match method {
        "append" => {
            arity(method, &args, 1, 1)?;
            let mut args = args;
            let value = args.remove(0);
            items.borrow_mut().push(value);
            Ok(Value::None)
        }
        "extend" => {
            arity(method, &args, 1, 1)?;
            let extra = match &args[0] {
                Value::List(other) => other.borrow().clone(),
                other => {
                    return Err(EvaluatorError::unary_type_error(
                        method,
                        "list",
                        other.type_name(),
                    ))
                }
            };
            items.borrow_mut().extend(extra);
            Ok(Value::None)
        }
        "insert" => {
            arity(method, &args, 2, 2)?;
            let index = expect_int(method, &args[0])?;
            let mut items = items.borrow_mut();
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            // Out-of-range positions clamp to the ends
            let at = if index < 0 { (len + index).max(0) } else { index.min(len) };
            let at = usize::try_from(at).unwrap_or(0);
            items.insert(at, args[1].clone());
            Ok(Value::None)
        }
        "pop" => {
            arity(method, &args, 0, 1)?;
            let mut items = items.borrow_mut();
            if items.is_empty() {
                return Err(EvaluatorError::invalid("pop from empty list"));
            }
            let index = match args.first() {
                Some(value) => expect_int(method, value)?,
                None => -1,
            };
            let at = resolve_index(index, items.len())?;
            Ok(items.remove(at))
        }
        "remove" => {
            arity(method, &args, 1, 1)?;
            let position = items.borrow().iter().position(|item| *item == args[0]);
            match position {
                Some(at) => {
                    items.borrow_mut().remove(at);
                    Ok(Value::None)
                }
                None => Err(EvaluatorError::invalid(format!(
                    "{} not in list",
                    args[0].repr()
                ))),
            }
        }
        "clear" => {
            arity(method, &args, 0, 0)?;
            items.borrow_mut().clear();
            Ok(Value::None)
        }
        "reverse" => {
            arity(method, &args, 0, 0)?;
            items.borrow_mut().reverse();
            Ok(Value::None)
        }
        "sort" => {
            arity(method, &args, 0, 0)?;
            let mut sorted = items.borrow().clone();
            sort_values(&mut sorted)?;
            *items.borrow_mut() = sorted;
            Ok(Value::None)
        }
        "index" => {
            arity(method, &args, 1, 1)?;
            let position = items.borrow().iter().position(|item| *item == args[0]);
            position.map(count_value).ok_or_else(|| {
                EvaluatorError::invalid(format!("{} not in list", args[0].repr()))
            })
        }
        "count" => {
            arity(method, &args, 1, 1)?;
            let n = items.borrow().iter().filter(|item| **item == args[0]).count();
            Ok(count_value(n))
        }
        "copy" => {
            arity(method, &args, 0, 0)?;
            Ok(Value::list(items.borrow().clone()))
        }
        _ => Err(not_found(&Value::List(items.clone()), method)),
    }
}

fn map_method(entries: &MapRef, method: &str, args: Vec<Value>) -> MethodResult {
    match method {
        "get" => {
            arity(method, &args, 1, 2)?;
            let key = expect_str(method, &args[0])?;
            let found = entries.borrow().get(key).cloned();
            Ok(found.unwrap_or_else(|| args.get(1).cloned().unwrap_or(Value::None)))
        }
        "keys" => {
            arity(method, &args, 0, 0)?;
            let keys = entries.borrow().keys().map(|k| Value::str(k.as_str())).collect();
            Ok(Value::list(keys))
        }
        "values" => {
            arity(method, &args, 0, 0)?;
            Ok(Value::list(entries.borrow().values().cloned().collect()))
        }
        "items" => {
            arity(method, &args, 0, 0)?;
            let pairs = entries
                .borrow()
                .iter()
                .map(|(k, v)| Value::list(vec![Value::str(k.as_str()), v.clone()]))
                .collect();
            Ok(Value::list(pairs))
        }
        "pop" => {
            arity(method, &args, 1, 2)?;
            let key = expect_str(method, &args[0])?;
            let removed = entries.borrow_mut().shift_remove(key);
            match (removed, args.get(1)) {
                (Some(value), _) => Ok(value),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Err(EvaluatorError::KeyNotFound {
                    key: key.to_string(),
                }),
            }
        }
        "update" => {
            arity(method, &args, 1, 1)?;
            let other: IndexMap<String, Value> = match &args[0] {
                Value::Map(other) => other.borrow().clone(),
                other => {
                    return Err(EvaluatorError::unary_type_error(
                        method,
                        "map",
                        other.type_name(),
                    ))
                }
            };
            entries.borrow_mut().extend(other);
            Ok(Value::None)
        }
        "clear" => {
            arity(method, &args, 0, 0)?;
            entries.borrow_mut().clear();
            Ok(Value::None)
        }
        "copy" => {
            arity(method, &args, 0, 0)?;
            Ok(Value::map(entries.borrow().clone()))
        }
        "setdefault" => {
            arity(method, &args, 1, 2)?;
            let key = expect_str(method, &args[0])?.to_string();
            let default = args.get(1).cloned().unwrap_or(Value::None);
            let mut entries = entries.borrow_mut();
            Ok(entries.entry(key).or_insert(default).clone())
        }
        _ => Err(not_found(&Value::Map(entries.clone()), method)),
    }
}

fn str_method(s: &str, method: &str, args: Vec<Value>) -> MethodResult {
    match method {
        "upper" => {
            arity(method, &args, 0, 0)?;
            Ok(Value::str(s.to_uppercase()))
        }
        "lower" => {
            arity(method, &args, 0, 0)?;
            Ok(Value::str(s.to_lowercase()))
        }
        "strip" => {
            arity(method, &args, 0, 0)?;
            Ok(Value::str(s.trim()))
        }
        "split" => {
            arity(method, &args, 0, 1)?;
            let parts: Vec<Value> = match args.first() {
                None => s.split_whitespace().map(Value::str).collect(),
                Some(sep) => {
                    let sep = expect_str(method, sep)?;
                    if sep.is_empty() {
                        return Err(EvaluatorError::invalid("empty separator"));
                    }
                    s.split(sep).map(Value::str).collect()
                }
            };
            Ok(Value::list(parts))
        }
        "join" => {
            arity(method, &args, 1, 1)?;
            let Value::List(items) = &args[0] else {
                return Err(EvaluatorError::unary_type_error(
                    method,
                    "list",
                    args[0].type_name(),
                ));
            };
            let items = items.borrow();
            let parts = items
                .iter()
                .map(|item| expect_str(method, item).map(str::to_string))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::str(parts.join(s)))
        }
        "replace" => {
            arity(method, &args, 2, 2)?;
            let from = expect_str(method, &args[0])?;
            let to = expect_str(method, &args[1])?;
            Ok(Value::str(s.replace(from, to)))
        }
        "startswith" => {
            arity(method, &args, 1, 1)?;
            Ok(Value::Bool(s.starts_with(expect_str(method, &args[0])?)))
        }
        "endswith" => {
            arity(method, &args, 1, 1)?;
            Ok(Value::Bool(s.ends_with(expect_str(method, &args[0])?)))
        }
        _ => Err(not_found(&Value::str(s), method)),
    }
}
