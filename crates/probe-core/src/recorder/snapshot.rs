use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::evaluator::value::{format_float, Value};

/// Immutable copy of a runtime value, taken when the hook fires. Later
/// mutation of the live value does not reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<RecordValue>),
    Map(IndexMap<String, RecordValue>),
    /// Values with no data of their own (functions, the hook), and containers
    /// that contain themselves, are kept by description
    Opaque(String),
}

impl RecordValue {
    pub fn snapshot(value: &Value) -> Self {
        let mut path = Vec::new();
        snapshot(value, &mut path)
    }
}

// `path` holds the containers currently being copied; meeting one again
// means the value is cyclic.
fn snapshot(value: &Value, path: &mut Vec<*const ()>) -> RecordValue {
    match value {
        Value::None => RecordValue::None,
        Value::Bool(b) => RecordValue::Bool(*b),
        Value::Int(n) => RecordValue::Int(*n),
        Value::Float(f) => RecordValue::Float(*f),
        Value::Str(s) => RecordValue::Str(s.clone()),
        Value::List(items) => {
            let id = std::rc::Rc::as_ptr(items) as *const ();
            if path.contains(&id) {
                return RecordValue::Opaque("[...]".to_string());
            }
            path.push(id);
            let copied = items.borrow().iter().map(|item| snapshot(item, path)).collect();
            path.pop();
            RecordValue::List(copied)
        }
        Value::Map(entries) => {
            let id = std::rc::Rc::as_ptr(entries) as *const ();
            if path.contains(&id) {
                return RecordValue::Opaque("{...}".to_string());
            }
            path.push(id);
            let copied = entries
                .borrow()
                .iter()
                .map(|(key, item)| (key.clone(), snapshot(item, path)))
                .collect();
            path.pop();
            RecordValue::Map(copied)
        }
        other => RecordValue::Opaque(other.to_string()),
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordValue::None => write!(f, "none"),
            RecordValue::Bool(b) => write!(f, "{b}"),
            RecordValue::Int(n) => write!(f, "{n}"),
            RecordValue::Float(x) => write!(f, "{}", format_float(*x)),
            RecordValue::Str(s) => write!(f, "{s:?}"),
            RecordValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            RecordValue::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, item)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key:?}: {item}")?;
                }
                write!(f, "}}")
            }
            RecordValue::Opaque(description) => write!(f, "{description}"),
        }
    }
}
