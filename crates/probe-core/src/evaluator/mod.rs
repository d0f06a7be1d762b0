// Tree-walking executor for compiled units.
//
// One global frame plus a stack of function frames. Reads fall back from the
// current frame to the globals, then to program functions and builtins;
// writes always go to the current frame. Capture slots live in the frame of
// the call that filled them and are consumed by the first read.

pub mod builtins;
pub mod errors;
pub mod methods;
pub mod ops;
pub mod value;


use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::ast::{
    Argument, BinaryOp, CaptureSlot, Expr, FunctionDef, Line, LogicalOp, Stmt, StmtKind, UnaryOp,
};
use crate::compiler::CompiledUnit;
use crate::recorder::{record, EventLog};
use crate::selector::HookBindings;
use crate::storage::DbResource;

pub use builtins::Builtin;
pub use errors::{EvalResult, EvaluatorError, RuntimeError};
pub use value::Value;

/// Default limit on nested function calls
pub const DEFAULT_MAX_CALL_DEPTH: usize = 200;

/// Stack left before a function body runs; below it the body gets a new segment
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_SEGMENT_SIZE: usize = 2 * 1024 * 1024;

/// Everything a run touches outside the program itself.
pub struct ExecutionContext<'r, 'db> {
    /// Receives one entry per hook invocation that carries a name
    pub log: &'r mut EventLog,
    /// Open persistence resource handed to the hook
    pub resource: &'r mut DbResource<'db>,
    /// Destination of `print`
    pub output: &'r mut dyn Write,
    pub bindings: &'r HookBindings,
    pub max_call_depth: usize,
}

/// Run `unit` to completion. The first runtime error ends the run and is
/// returned with the unit name and the innermost statement line attached.
pub fn execute<'r>(
    unit: &'r CompiledUnit,
    context: ExecutionContext<'r, '_>,
) -> Result<(), RuntimeError> {
    debug!(unit = %unit.name, functions = unit.functions.len(), "executing unit");
    let mut evaluator = Evaluator::new(unit, context);
    evaluator.run().map_err(|e| e.in_unit(&unit.name))
}

/// Control flow out of a statement or block
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

#[derive(Debug)]
pub(crate) struct CallArg {
    pub keyword: Option<String>,
    pub value: Value,
}

#[derive(Debug, Default)]
struct Frame {
    variables: HashMap<String, Value>,
    captures: HashMap<CaptureSlot, Value>,
}

pub(crate) struct Evaluator<'r, 'db> {
    unit: &'r CompiledUnit,
    ctx: ExecutionContext<'r, 'db>,
    globals: Frame,
    locals: Vec<Frame>,
}

impl<'r, 'db> Evaluator<'r, 'db> {
    pub fn new(unit: &'r CompiledUnit, ctx: ExecutionContext<'r, 'db>) -> Self {
        // Exactly three names are predefined: the log, the hook and the resource
        let mut globals = Frame::default();
        let bindings = ctx.bindings;
        globals.variables.insert(bindings.log.clone(), Value::Log);
        globals.variables.insert(bindings.hook.clone(), Value::Hook);
        globals.variables.insert(bindings.resource.clone(), Value::Resource);
        Self {
            unit,
            ctx,
            globals,
            locals: Vec::new(),
        }
    }

    pub fn run(&mut self) -> EvalResult<()> {
        let unit = self.unit;
        // The compiler rejects break, continue and return at top level
        self.exec_block(&unit.body)?;
        Ok(())
    }

    fn frame(&self) -> &Frame {
        self.locals.last().unwrap_or(&self.globals)
    }

    fn frame_mut(&mut self) -> &mut Frame {
        match self.locals.last_mut() {
            Some(frame) => frame,
            None => &mut self.globals,
        }
    }

    fn lookup(&self, name: &str) -> EvalResult<Value> {
        if let Some(value) = self
            .frame()
            .variables
            .get(name)
            .or_else(|| self.globals.variables.get(name))
        {
            return Ok(value.clone());
        }
        if let Some(def) = self.unit.functions.get(name) {
            return Ok(Value::Function(Rc::clone(def)));
        }
        if let Some(builtin) = Builtin::lookup(name) {
            return Ok(Value::Builtin(builtin));
        }
        Err(EvaluatorError::VariableNotFound {
            name: name.to_string(),
        }
        .into())
    }

    fn assign(&mut self, name: &str, value: Value) {
        self.frame_mut().variables.insert(name.to_string(), value);
    }

    fn exec_block(&mut self, stmts: &[Stmt]) -> EvalResult<Flow> {
        for stmt in stmts {
            match self.exec_stmt(stmt).map_err(|e| e.at(stmt.line))? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> EvalResult<Flow> {
        match &stmt.kind {
            StmtKind::Assign { targets, value } => {
                let value = self.eval(value)?;
                self.bind_targets(targets, value)?;
            }
            StmtKind::AugAssign { target, op, value } => {
                let current = self.lookup(target)?;
                let rhs = self.eval(value)?;
                let updated = augment(*op, current, rhs)?;
                self.assign(target, updated);
            }
            StmtKind::IndexAssign {
                object,
                index,
                value,
            } => {
                let value = self.eval(value)?;
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                ops::set_index(&object, &index, value)?;
            }
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
            }
            StmtKind::If {
                branches,
                else_branch,
            } => {
                for branch in branches {
                    if self.eval(&branch.condition)?.is_truthy() {
                        return self.exec_block(&branch.body);
                    }
                }
                if let Some(body) = else_branch {
                    return self.exec_block(body);
                }
            }
            StmtKind::While { condition, body } => {
                while self.eval(condition)?.is_truthy() {
                    match self.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
            }
            StmtKind::For {
                variable,
                iterable,
                body,
            } => {
                let iterable = self.eval(iterable)?;
                for item in iteration_items(&iterable)? {
                    self.assign(variable, item);
                    match self.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
            }
            // Hoisted into the unit's function table at compile time
            StmtKind::FnDef(_) => {}
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Raise(expr) => {
                let value = self.eval(expr)?;
                return Err(EvaluatorError::Raised {
                    message: value.to_string(),
                }
                .into());
            }
        }
        Ok(Flow::Normal)
    }

    fn bind_targets(&mut self, targets: &[String], value: Value) -> EvalResult<()> {
        if let [target] = targets {
            self.assign(target, value);
            return Ok(());
        }
        let items = match &value {
            Value::List(items) if items.borrow().len() == targets.len() => items.borrow().clone(),
            Value::List(items) => {
                return Err(EvaluatorError::Unpack {
                    expected: targets.len(),
                    actual: format!("a list of {}", items.borrow().len()),
                }
                .into())
            }
            other => {
                return Err(EvaluatorError::Unpack {
                    expected: targets.len(),
                    actual: format!("a {}", other.type_name()),
                }
                .into())
            }
        };
        for (target, item) in targets.iter().zip(items) {
            self.assign(target, item);
        }
        Ok(())
    }

    pub(crate) fn eval(&mut self, expr: &Expr) -> EvalResult<Value> {
        match expr {
            Expr::None => Ok(Value::None),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Identifier(name) => self.lookup(name),
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                Ok(Value::list(values))
            }
            Expr::Map(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = match self.eval(key)? {
                        Value::Str(key) => key,
                        other => {
                            return Err(EvaluatorError::unary_type_error(
                                "map key",
                                "str",
                                other.type_name(),
                            )
                            .into())
                        }
                    };
                    let value = self.eval(value)?;
                    map.insert(key, value);
                }
                Ok(Value::map(map))
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(ops::binary(*op, &left, &right)?)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left)?;
                // Short circuit, yielding the deciding operand
                let decided = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                };
                if decided {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                match (op, operand) {
                    (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
                    (UnaryOp::Neg, Value::Int(n)) => n
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| EvaluatorError::overflow("-").into()),
                    (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
                    (UnaryOp::Neg, other) => Err(EvaluatorError::unary_type_error(
                        "-",
                        "number",
                        other.type_name(),
                    )
                    .into()),
                }
            }
            Expr::Call { callee, args } => self.eval_call(callee, args),
            Expr::MethodCall {
                receiver,
                method,
                args,
                capture,
                ..
            } => {
                let target = self.eval(receiver)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in self.eval_arguments(args)? {
                    if let Some(keyword) = arg.keyword {
                        return Err(EvaluatorError::UnexpectedKeyword {
                            function: method.clone(),
                            keyword,
                        }
                        .into());
                    }
                    values.push(arg.value);
                }
                let result = methods::call(&target, method, values)?;
                if let Some(slot) = capture {
                    trace!(%slot, method = %method, "receiver captured");
                    self.frame_mut().captures.insert(*slot, target);
                }
                Ok(result)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                Ok(ops::get_index(&object, &index)?)
            }
            Expr::Capture(slot) => self.frame_mut().captures.remove(slot).ok_or_else(|| {
                EvaluatorError::invalid(format!("capture {slot} read before it was filled")).into()
            }),
        }
    }

    fn eval_arguments(&mut self, args: &[Argument]) -> EvalResult<Vec<CallArg>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(CallArg {
                keyword: arg.keyword.clone(),
                value: self.eval(&arg.value)?,
            });
        }
        Ok(values)
    }

    fn eval_call(&mut self, callee: &str, args: &[Argument]) -> EvalResult<Value> {
        // A hook whose annotated call never ran has nothing to report
        let unfilled = args.iter().any(|arg| match &arg.value {
            Expr::Capture(slot) => !self.frame().captures.contains_key(slot),
            _ => false,
        });
        if unfilled {
            trace!(callee, "skipping call with an unfilled capture");
            return Ok(Value::None);
        }

        let target = self.lookup(callee)?;
        let args = self.eval_arguments(args)?;
        match target {
            Value::Function(def) => self.call_function(&def, args),
            Value::Builtin(builtin) => self.call_builtin(builtin, args),
            Value::Hook => self.invoke_hook(args),
            other => Err(EvaluatorError::NotCallable {
                name: callee.to_string(),
                type_name: other.type_name().to_string(),
            }
            .into()),
        }
    }

    fn call_function(&mut self, def: &Rc<FunctionDef>, args: Vec<CallArg>) -> EvalResult<Value> {
        if self.locals.len() >= self.ctx.max_call_depth {
            return Err(EvaluatorError::RecursionLimit {
                limit: self.ctx.max_call_depth,
            }
            .into());
        }

        let given = args.len();
        let arity = || EvaluatorError::arity(&def.name, def.params.len().to_string(), given);
        let mut frame = Frame::default();
        let mut next_positional = 0;
        for arg in args {
            let param = match arg.keyword {
                None => {
                    let param = def.params.get(next_positional).ok_or_else(arity)?;
                    next_positional += 1;
                    param.clone()
                }
                Some(keyword) => {
                    if !def.params.contains(&keyword) {
                        return Err(EvaluatorError::UnexpectedKeyword {
                            function: def.name.clone(),
                            keyword,
                        }
                        .into());
                    }
                    keyword
                }
            };
            if frame.variables.insert(param.clone(), arg.value).is_some() {
                return Err(EvaluatorError::invalid(format!(
                    "{}() got multiple values for '{param}'",
                    def.name
                ))
                .into());
            }
        }
        if frame.variables.len() != def.params.len() {
            return Err(arity().into());
        }

        let def = Rc::clone(def);
        self.locals.push(frame);
        // Deep script recursion must end in RecursionLimit, not a native overflow
        let flow = stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT_SIZE, || {
            self.exec_block(&def.body)
        });
        self.locals.pop();
        match flow? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::None),
        }
    }

    /// `log_variable(val, name, lineno, db)`, by position or keyword.
    fn invoke_hook(&mut self, args: Vec<CallArg>) -> EvalResult<Value> {
        let bindings = self.ctx.bindings;
        let keywords = [
            &bindings.value,
            &bindings.name,
            &bindings.line,
            &bindings.resource,
        ];
        let given = args.len();
        let mut slots: [Option<Value>; 4] = Default::default();
        let mut next_positional = 0;
        for arg in args {
            let index = match &arg.keyword {
                None => {
                    let index = next_positional;
                    next_positional += 1;
                    if index >= slots.len() {
                        return Err(EvaluatorError::arity(&bindings.hook, "at most 4", given).into());
                    }
                    index
                }
                Some(keyword) => keywords
                    .iter()
                    .position(|name| *name == keyword)
                    .ok_or_else(|| EvaluatorError::UnexpectedKeyword {
                        function: bindings.hook.clone(),
                        keyword: keyword.clone(),
                    })?,
            };
            if slots[index].replace(arg.value).is_some() {
                return Err(EvaluatorError::invalid(format!(
                    "{}() got multiple values for '{}'",
                    bindings.hook, keywords[index]
                ))
                .into());
            }
        }

        let [value, name, line, resource] = slots;
        let value = value.unwrap_or(Value::None);
        let name = match name {
            None | Some(Value::None) => None,
            Some(Value::Str(name)) => Some(name),
            Some(other) => {
                return Err(
                    EvaluatorError::unary_type_error(&bindings.name, "str", other.type_name())
                        .into(),
                )
            }
        };
        let line = match line {
            None | Some(Value::None) => None,
            Some(Value::Int(n)) => Some(Line::try_from(n).map_err(|_| {
                EvaluatorError::invalid(format!("{n} is not a source line"))
            })?),
            Some(other) => {
                return Err(
                    EvaluatorError::unary_type_error(&bindings.line, "int", other.type_name())
                        .into(),
                )
            }
        };
        let resource = match resource {
            Some(Value::Resource) => Some(&mut *self.ctx.resource),
            _ => None,
        };

        record(&mut *self.ctx.log, resource, &value, name.as_deref(), line);
        Ok(Value::None)
    }
}

/// `x op= rhs`. Adding a list to a list extends it in place.
fn augment(op: BinaryOp, current: Value, rhs: Value) -> Result<Value, EvaluatorError> {
    if let (BinaryOp::Add, Value::List(items), Value::List(extra)) = (op, &current, &rhs) {
        let extra = extra.borrow().clone();
        items.borrow_mut().extend(extra);
        return Ok(current);
    }
    ops::binary(op, &current, &rhs)
}

/// Items a `for` loop visits: a snapshot of a list, the keys of a map or the
/// characters of a string.
fn iteration_items(value: &Value) -> Result<Vec<Value>, EvaluatorError> {
    match value {
        Value::List(items) => Ok(items.borrow().clone()),
        Value::Map(entries) => Ok(entries
            .borrow()
            .keys()
            .map(|key| Value::str(key.as_str()))
            .collect()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        other => Err(EvaluatorError::unary_type_error(
            "for loop",
            "list, map or str",
            other.type_name(),
        )),
    }
}
