use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;

use crate::ast::FunctionDef;

use super::builtins::Builtin;

pub type ListRef = Rc<RefCell<Vec<Value>>>;
pub type MapRef = Rc<RefCell<IndexMap<String, Value>>>;

/// Runtime value. Lists and maps are shared by reference, so aliasing and
/// in-place mutation behave the way scripts expect.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(ListRef),
    Map(MapRef),
    Function(Rc<FunctionDef>),
    Builtin(Builtin),
    /// The logging hook bound into the namespace
    Hook,
    /// The log sequence bound into the namespace
    Log,
    /// The persistence resource bound into the namespace
    Resource,
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn map(entries: IndexMap<String, Value>) -> Self {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin",
            Value::Hook => "hook",
            Value::Log => "log",
            Value::Resource => "resource",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Map(entries) => !entries.borrow().is_empty(),
            _ => true,
        }
    }

    /// Quoted form used inside containers
    pub fn repr(&self) -> String {
        let mut out = String::new();
        let mut path = Vec::new();
        // Writing into a String cannot fail
        let _ = write_value(&mut out, self, true, &mut path);
        out
    }
}

pub(crate) fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut path = Vec::new();
        write_value(f, self, false, &mut path)
    }
}

/// Address of a shared container, used to spot cycles.
fn container_id(value: &Value) -> Option<*const ()> {
    match value {
        Value::List(items) => Some(Rc::as_ptr(items) as *const ()),
        Value::Map(entries) => Some(Rc::as_ptr(entries) as *const ()),
        _ => None,
    }
}

// `path` holds the containers currently being written; meeting one again
// means the value contains itself.
fn write_value(
    out: &mut dyn fmt::Write,
    value: &Value,
    quoted: bool,
    path: &mut Vec<*const ()>,
) -> fmt::Result {
    match value {
        Value::None => write!(out, "none"),
        Value::Bool(b) => write!(out, "{b}"),
        Value::Int(n) => write!(out, "{n}"),
        Value::Float(x) => write!(out, "{}", format_float(*x)),
        Value::Str(s) if quoted => write!(out, "{s:?}"),
        Value::Str(s) => write!(out, "{s}"),
        Value::List(items) => {
            let id = Rc::as_ptr(items) as *const ();
            if path.contains(&id) {
                return write!(out, "[...]");
            }
            path.push(id);
            write!(out, "[")?;
            for (i, item) in items.borrow().iter().enumerate() {
                if i > 0 {
                    write!(out, ", ")?;
                }
                write_value(out, item, true, path)?;
            }
            path.pop();
            write!(out, "]")
        }
        Value::Map(entries) => {
            let id = Rc::as_ptr(entries) as *const ();
            if path.contains(&id) {
                return write!(out, "{{...}}");
            }
            path.push(id);
            write!(out, "{{")?;
            for (i, (key, item)) in entries.borrow().iter().enumerate() {
                if i > 0 {
                    write!(out, ", ")?;
                }
                write!(out, "{key:?}: ")?;
                write_value(out, item, true, path)?;
            }
            path.pop();
            write!(out, "}}")
        }
        Value::Function(def) => write!(out, "<fn {}>", def.name),
        Value::Builtin(builtin) => write!(out, "<builtin {}>", builtin.name()),
        Value::Hook => write!(out, "<hook>"),
        Value::Log => write!(out, "<log>"),
        Value::Resource => write!(out, "<resource>"),
    }
}

/// Equality as scripts see it: numbers compare across int and float, lists
/// and maps compare by contents. A pair of containers met again while
/// comparing them counts as equal, so cyclic values compare without looping.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let mut seen = Vec::new();
        values_equal(self, other, &mut seen)
    }
}

fn values_equal(left: &Value, right: &Value, seen: &mut Vec<(*const (), *const ())>) -> bool {
    if let (Some(l), Some(r)) = (container_id(left), container_id(right)) {
        if l == r || seen.contains(&(l, r)) {
            return true;
        }
        seen.push((l, r));
        let equal = match (left, right) {
            (Value::List(l), Value::List(r)) => {
                let (l, r) = (l.borrow(), r.borrow());
                l.len() == r.len() && l.iter().zip(r.iter()).all(|(x, y)| values_equal(x, y, seen))
            }
            (Value::Map(l), Value::Map(r)) => {
                let (l, r) = (l.borrow(), r.borrow());
                l.len() == r.len()
                    && l.iter().all(|(key, lv)| {
                        r.get(key).is_some_and(|rv| values_equal(lv, rv, seen))
                    })
            }
            _ => false,
        };
        seen.pop();
        return equal;
    }
    match (left, right) {
        (Value::None, Value::None) => true,
        (Value::Bool(l), Value::Bool(r)) => l == r,
        (Value::Int(l), Value::Int(r)) => l == r,
        (Value::Float(l), Value::Float(r)) => l == r,
        (Value::Int(l), Value::Float(r)) | (Value::Float(r), Value::Int(l)) => (*l as f64) == *r,
        (Value::Str(l), Value::Str(r)) => l == r,
        (Value::Function(l), Value::Function(r)) => Rc::ptr_eq(l, r),
        (Value::Builtin(l), Value::Builtin(r)) => l == r,
        (Value::Hook, Value::Hook) | (Value::Log, Value::Log) => true,
        (Value::Resource, Value::Resource) => true,
        _ => false,
    }
}
