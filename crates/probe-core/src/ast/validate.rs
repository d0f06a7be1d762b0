use std::collections::HashSet;

use super::{Argument, CaptureSlot, Expr, Line, Program, Stmt, StmtKind, KEYWORDS};

/// Structural defects in a program tree.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    #[error("statement without a source line")]
    MissingLine,

    #[error("line {line}: '{name}' is not a valid identifier")]
    InvalidIdentifier { line: Line, name: String },

    #[error("line {line}: assignment has no targets")]
    EmptyTargets { line: Line },

    #[error("line {line}: augmented assignment with operator '{op}'")]
    InvalidAugmentedOperator { line: Line, op: &'static str },

    #[error("line {line}: if statement without a condition branch")]
    EmptyIf { line: Line },

    #[error("line {line}: function '{name}' defined below top level")]
    NestedFunction { line: Line, name: String },

    #[error("line {line}: capture slot {slot} is annotated more than once")]
    DuplicateCapture { line: Line, slot: CaptureSlot },

    #[error("line {line}: capture slot {slot} is read before any call fills it")]
    DanglingCapture { line: Line, slot: CaptureSlot },
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_well = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    starts_well
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !KEYWORDS.contains(&name)
}

/// Check that a tree is something the compiler and evaluator can accept.
pub fn validate(program: &Program) -> Result<(), TreeError> {
    let mut checker = Checker::default();
    checker.statements(&program.statements, true)
}

#[derive(Default)]
struct Checker {
    // Every slot annotated anywhere in the program
    annotated: HashSet<CaptureSlot>,
    // Slots annotated so far in the function body (or top level) being walked
    in_scope: HashSet<CaptureSlot>,
}

impl Checker {
    fn statements(&mut self, stmts: &[Stmt], top_level: bool) -> Result<(), TreeError> {
        for stmt in stmts {
            self.statement(stmt, top_level)?;
        }
        Ok(())
    }

    fn name(&self, line: Line, name: &str) -> Result<(), TreeError> {
        if is_identifier(name) {
            Ok(())
        } else {
            Err(TreeError::InvalidIdentifier {
                line,
                name: name.to_string(),
            })
        }
    }

    fn statement(&mut self, stmt: &Stmt, top_level: bool) -> Result<(), TreeError> {
        let line = stmt.line;
        if line == 0 {
            return Err(TreeError::MissingLine);
        }

        match &stmt.kind {
            StmtKind::Assign { targets, value } => {
                if targets.is_empty() {
                    return Err(TreeError::EmptyTargets { line });
                }
                self.expr(line, value)?;
                for target in targets {
                    self.name(line, target)?;
                }
            }
            StmtKind::AugAssign { target, op, value } => {
                use super::BinaryOp;
                if !matches!(
                    op,
                    BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div
                ) {
                    return Err(TreeError::InvalidAugmentedOperator {
                        line,
                        op: op.symbol(),
                    });
                }
                self.name(line, target)?;
                self.expr(line, value)?;
            }
            StmtKind::IndexAssign {
                object,
                index,
                value,
            } => {
                self.expr(line, object)?;
                self.expr(line, index)?;
                self.expr(line, value)?;
            }
            StmtKind::Expr(expr) | StmtKind::Raise(expr) => self.expr(line, expr)?,
            StmtKind::Return(value) => {
                if let Some(expr) = value {
                    self.expr(line, expr)?;
                }
            }
            StmtKind::If {
                branches,
                else_branch,
            } => {
                if branches.is_empty() {
                    return Err(TreeError::EmptyIf { line });
                }
                // Any branch body may observe captures from every condition
                for branch in branches {
                    self.expr(line, &branch.condition)?;
                }
                for branch in branches {
                    self.statements(&branch.body, false)?;
                }
                if let Some(body) = else_branch {
                    self.statements(body, false)?;
                }
            }
            StmtKind::While { condition, body } => {
                self.expr(line, condition)?;
                self.statements(body, false)?;
            }
            StmtKind::For {
                variable,
                iterable,
                body,
            } => {
                self.name(line, variable)?;
                self.expr(line, iterable)?;
                self.statements(body, false)?;
            }
            StmtKind::FnDef(def) => {
                if !top_level {
                    return Err(TreeError::NestedFunction {
                        line,
                        name: def.name.clone(),
                    });
                }
                self.name(line, &def.name)?;
                for param in &def.params {
                    self.name(line, param)?;
                }
                // Captures never cross a function boundary
                let outer = std::mem::take(&mut self.in_scope);
                let result = self.statements(&def.body, false);
                self.in_scope = outer;
                result?;
            }
            StmtKind::Break | StmtKind::Continue => {}
        }
        Ok(())
    }

    fn arguments(&mut self, line: Line, args: &[Argument]) -> Result<(), TreeError> {
        for arg in args {
            if let Some(keyword) = &arg.keyword {
                self.name(line, keyword)?;
            }
            self.expr(line, &arg.value)?;
        }
        Ok(())
    }

    fn expr(&mut self, line: Line, expr: &Expr) -> Result<(), TreeError> {
        match expr {
            Expr::None | Expr::Bool(_) | Expr::Int(_) | Expr::Float(_) | Expr::Str(_) => Ok(()),
            Expr::Identifier(name) => self.name(line, name),
            Expr::List(items) => items.iter().try_for_each(|item| self.expr(line, item)),
            Expr::Map(entries) => entries.iter().try_for_each(|(key, value)| {
                self.expr(line, key)?;
                self.expr(line, value)
            }),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.expr(line, left)?;
                self.expr(line, right)
            }
            Expr::Unary { operand, .. } => self.expr(line, operand),
            Expr::Call { callee, args } => {
                self.name(line, callee)?;
                self.arguments(line, args)
            }
            Expr::MethodCall {
                receiver,
                method,
                args,
                line: call_line,
                capture,
            } => {
                if *call_line == 0 {
                    return Err(TreeError::MissingLine);
                }
                self.expr(line, receiver)?;
                self.name(line, method)?;
                self.arguments(line, args)?;
                if let Some(slot) = capture {
                    if !self.annotated.insert(*slot) {
                        return Err(TreeError::DuplicateCapture { line, slot: *slot });
                    }
                    self.in_scope.insert(*slot);
                }
                Ok(())
            }
            Expr::Index { object, index } => {
                self.expr(line, object)?;
                self.expr(line, index)
            }
            Expr::Capture(slot) => {
                if self.in_scope.contains(slot) {
                    Ok(())
                } else {
                    Err(TreeError::DanglingCapture { line, slot: *slot })
                }
            }
        }
    }
}
