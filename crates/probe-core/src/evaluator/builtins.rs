// Builtin functions available to every program.

use std::cmp::Ordering;

use crate::ast::BinaryOp;

use super::errors::{EvalResult, EvaluatorError};
use super::ops;
use super::value::{format_float, Value};
use super::{CallArg, Evaluator};

/// Upper bound on the length of a list built by `range`
const MAX_RANGE_LEN: i64 = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Len,
    Str,
    Int,
    Float,
    Bool,
    Range,
    Type,
    Abs,
    Min,
    Max,
    Sum,
    Sorted,
}

impl Builtin {
    pub const ALL: [Builtin; 13] = [
        Builtin::Print,
        Builtin::Len,
        Builtin::Str,
        Builtin::Int,
        Builtin::Float,
        Builtin::Bool,
        Builtin::Range,
        Builtin::Type,
        Builtin::Abs,
        Builtin::Min,
        Builtin::Max,
        Builtin::Sum,
        Builtin::Sorted,
    ];

    pub fn lookup(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Len => "len",
            Builtin::Str => "str",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Bool => "bool",
            Builtin::Range => "range",
            Builtin::Type => "type",
            Builtin::Abs => "abs",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Sum => "sum",
            Builtin::Sorted => "sorted",
        }
    }
}

fn exactly(builtin: Builtin, args: &[Value], count: usize) -> Result<(), EvaluatorError> {
    if args.len() == count {
        Ok(())
    } else {
        Err(EvaluatorError::arity(builtin.name(), count.to_string(), args.len()))
    }
}

fn int_arg(builtin: Builtin, value: &Value) -> Result<i64, EvaluatorError> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(EvaluatorError::unary_type_error(
            builtin.name(),
            "int",
            other.type_name(),
        )),
    }
}

/// Elements of a list argument, copied out so no borrow is held.
fn list_items(builtin: Builtin, value: &Value) -> Result<Vec<Value>, EvaluatorError> {
    match value {
        Value::List(items) => Ok(items.borrow().clone()),
        other => Err(EvaluatorError::unary_type_error(
            builtin.name(),
            "list",
            other.type_name(),
        )),
    }
}

/// Sort by script ordering; the first incomparable pair is the error.
pub(crate) fn sort_values(items: &mut [Value]) -> Result<(), EvaluatorError> {
    let mut failure = None;
    items.sort_by(|a, b| match ops::compare(BinaryOp::Lt, a, b) {
        Ok(ordering) => ordering,
        Err(err) => {
            failure.get_or_insert(err);
            Ordering::Equal
        }
    });
    failure.map_or(Ok(()), Err)
}

impl Evaluator<'_, '_> {
    pub(crate) fn call_builtin(&mut self, builtin: Builtin, args: Vec<CallArg>) -> EvalResult<Value> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            if let Some(keyword) = arg.keyword {
                return Err(EvaluatorError::UnexpectedKeyword {
                    function: builtin.name().to_string(),
                    keyword,
                }
                .into());
            }
            values.push(arg.value);
        }
        Ok(self.apply_builtin(builtin, values)?)
    }

    fn apply_builtin(&mut self, builtin: Builtin, args: Vec<Value>) -> Result<Value, EvaluatorError> {
        match builtin {
            Builtin::Print => {
                let line = args
                    .iter()
                    .map(Value::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                writeln!(self.ctx.output, "{line}")
                    .map_err(|e| EvaluatorError::Output(e.to_string()))?;
                Ok(Value::None)
            }
            Builtin::Len => {
                exactly(builtin, &args, 1)?;
                let len = match &args[0] {
                    Value::Str(s) => s.chars().count(),
                    Value::List(items) => items.borrow().len(),
                    Value::Map(entries) => entries.borrow().len(),
                    Value::Log => self.ctx.log.len(),
                    other => {
                        return Err(EvaluatorError::unary_type_error(
                            "len",
                            "str, list, map or log",
                            other.type_name(),
                        ))
                    }
                };
                Ok(Value::Int(i64::try_from(len).map_err(|_| EvaluatorError::overflow("len"))?))
            }
            Builtin::Str => {
                exactly(builtin, &args, 1)?;
                Ok(Value::Str(args[0].to_string()))
            }
            Builtin::Int => {
                exactly(builtin, &args, 1)?;
                match &args[0] {
                    Value::Int(n) => Ok(Value::Int(*n)),
                    Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                    Value::Float(f) => {
                        let truncated = f.trunc();
                        if truncated.is_finite()
                            && truncated >= i64::MIN as f64
                            && truncated < i64::MAX as f64
                        {
                            Ok(Value::Int(truncated as i64))
                        } else {
                            Err(EvaluatorError::invalid(format!(
                                "cannot convert {} to int",
                                format_float(*f)
                            )))
                        }
                    }
                    Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
                        EvaluatorError::invalid(format!("invalid literal for int(): {s:?}"))
                    }),
                    other => Err(EvaluatorError::unary_type_error(
                        "int",
                        "number or str",
                        other.type_name(),
                    )),
                }
            }
            Builtin::Float => {
                exactly(builtin, &args, 1)?;
                match &args[0] {
                    Value::Int(n) => Ok(Value::Float(*n as f64)),
                    Value::Float(f) => Ok(Value::Float(*f)),
                    Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
                    Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
                        EvaluatorError::invalid(format!("invalid literal for float(): {s:?}"))
                    }),
                    other => Err(EvaluatorError::unary_type_error(
                        "float",
                        "number or str",
                        other.type_name(),
                    )),
                }
            }
            Builtin::Bool => {
                exactly(builtin, &args, 1)?;
                Ok(Value::Bool(args[0].is_truthy()))
            }
            Builtin::Range => {
                let (start, stop, step) = match args.as_slice() {
                    [stop] => (0, int_arg(builtin, stop)?, 1),
                    [start, stop] => (int_arg(builtin, start)?, int_arg(builtin, stop)?, 1),
                    [start, stop, step] => (
                        int_arg(builtin, start)?,
                        int_arg(builtin, stop)?,
                        int_arg(builtin, step)?,
                    ),
                    _ => return Err(EvaluatorError::arity("range", "1 to 3", args.len())),
                };
                range(start, stop, step)
            }
            Builtin::Type => {
                exactly(builtin, &args, 1)?;
                Ok(Value::str(args[0].type_name()))
            }
            Builtin::Abs => {
                exactly(builtin, &args, 1)?;
                match &args[0] {
                    Value::Int(n) => n
                        .checked_abs()
                        .map(Value::Int)
                        .ok_or_else(|| EvaluatorError::overflow("abs")),
                    Value::Float(f) => Ok(Value::Float(f.abs())),
                    other => Err(EvaluatorError::unary_type_error(
                        "abs",
                        "number",
                        other.type_name(),
                    )),
                }
            }
            Builtin::Min | Builtin::Max => {
                let candidates = match args.len() {
                    0 => return Err(EvaluatorError::arity(builtin.name(), "at least 1", 0)),
                    1 => list_items(builtin, &args[0])?,
                    _ => args,
                };
                let wanted = if builtin == Builtin::Min {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                let mut best: Option<Value> = None;
                for candidate in candidates {
                    best = Some(match best {
                        None => candidate,
                        Some(current) => {
                            if ops::compare(BinaryOp::Lt, &candidate, &current)? == wanted {
                                candidate
                            } else {
                                current
                            }
                        }
                    });
                }
                best.ok_or_else(|| {
                    EvaluatorError::invalid(format!("{}() of an empty list", builtin.name()))
                })
            }
            Builtin::Sum => {
                exactly(builtin, &args, 1)?;
                let mut total = Value::Int(0);
                for item in list_items(builtin, &args[0])? {
                    total = ops::binary(BinaryOp::Add, &total, &item)?;
                }
                Ok(total)
            }
            Builtin::Sorted => {
                exactly(builtin, &args, 1)?;
                let mut items = list_items(builtin, &args[0])?;
                sort_values(&mut items)?;
                Ok(Value::list(items))
            }
        }
    }
}

fn range(start: i64, stop: i64, step: i64) -> Result<Value, EvaluatorError> {
    if step == 0 {
        return Err(EvaluatorError::invalid("range() step must not be zero"));
    }
    let span = if step > 0 {
        (i128::from(stop) - i128::from(start) + i128::from(step) - 1) / i128::from(step)
    } else {
        (i128::from(start) - i128::from(stop) - i128::from(step) - 1) / -i128::from(step)
    };
    let len = span.max(0);
    if len > i128::from(MAX_RANGE_LEN) {
        return Err(EvaluatorError::invalid(format!(
            "range() of {len} elements is too large"
        )));
    }
    let items = (0..len)
        .map(|i| Value::Int((i128::from(start) + i * i128::from(step)) as i64))
        .collect();
    Ok(Value::list(items))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(value: Value) -> Vec<i64> {
        let Value::List(items) = value else {
            panic!("expected list");
        };
        let items = items.borrow();
        items
            .iter()
            .map(|v| match v {
                Value::Int(n) => *n,
                other => panic!("expected int, got {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_range_lengths() {
        assert_eq!(ints(range(0, 4, 1).unwrap()), vec![0, 1, 2, 3]);
        assert_eq!(ints(range(1, 8, 3).unwrap()), vec![1, 4, 7]);
        assert_eq!(ints(range(5, 0, -2).unwrap()), vec![5, 3, 1]);
        assert!(ints(range(3, 3, 1).unwrap()).is_empty());
        assert!(ints(range(3, 0, 1).unwrap()).is_empty());
        assert!(range(0, 1, 0).is_err());
        assert!(range(0, i64::MAX, 1).is_err());
    }

    #[test]
    fn test_lookup() {
        assert_eq!(Builtin::lookup("sorted"), Some(Builtin::Sorted));
        assert_eq!(Builtin::lookup("eval"), None);
    }

    #[test]
    fn test_sort_values_reports_incomparable() {
        let mut mixed = vec![Value::Int(1), Value::str("a")];
        assert!(sort_values(&mut mixed).is_err());
        let mut numbers = vec![Value::Float(2.5), Value::Int(1), Value::Int(3)];
        sort_values(&mut numbers).unwrap();
        assert_eq!(numbers, vec![Value::Int(1), Value::Float(2.5), Value::Int(3)]);
    }
}
