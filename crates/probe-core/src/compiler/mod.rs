// Turns a (rewritten) program into an executable unit.
//
// Compilation is a checking pass: it hoists function definitions into a
// lookup table and rejects programs the evaluator would otherwise have to
// guess about.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::debug;

use crate::ast::{FunctionDef, Line, Program, Stmt, StmtKind};

/// An executable unit: the top-level statements plus the function table.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    /// Name reported in runtime errors, usually the source file name
    pub name: String,
    pub body: Vec<Stmt>,
    pub functions: HashMap<String, Rc<FunctionDef>>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{unit}, line {line}: {message}")]
pub struct CompileError {
    pub unit: String,
    pub line: Line,
    pub message: String,
}

pub fn compile(program: Program, unit: &str) -> Result<CompiledUnit, CompileError> {
    let error = |line: Line, message: String| CompileError {
        unit: unit.to_string(),
        line,
        message,
    };

    let mut functions = HashMap::new();
    for stmt in &program.statements {
        let StmtKind::FnDef(def) = &stmt.kind else {
            continue;
        };
        let mut seen = HashSet::new();
        for param in &def.params {
            if !seen.insert(param.as_str()) {
                return Err(error(
                    stmt.line,
                    format!("duplicate parameter '{param}' in function '{}'", def.name),
                ));
            }
        }
        if functions
            .insert(def.name.clone(), Rc::new(def.clone()))
            .is_some()
        {
            return Err(error(
                stmt.line,
                format!("function '{}' is defined more than once", def.name),
            ));
        }
        check_block(&def.body, Scope::FUNCTION).map_err(|(line, message)| error(line, message))?;
    }
    check_block(&program.statements, Scope::TOP_LEVEL)
        .map_err(|(line, message)| error(line, message))?;

    debug!(unit, functions = functions.len(), "compiled");
    Ok(CompiledUnit {
        name: unit.to_string(),
        body: program.statements,
        functions,
    })
}

#[derive(Debug, Clone, Copy)]
struct Scope {
    in_function: bool,
    in_loop: bool,
    nested: bool,
}

impl Scope {
    const TOP_LEVEL: Scope = Scope {
        in_function: false,
        in_loop: false,
        nested: false,
    };
    const FUNCTION: Scope = Scope {
        in_function: true,
        in_loop: false,
        nested: true,
    };

    fn nested(self) -> Scope {
        Scope {
            nested: true,
            ..self
        }
    }

    fn looping(self) -> Scope {
        Scope {
            in_loop: true,
            nested: true,
            ..self
        }
    }
}

fn check_block(stmts: &[Stmt], scope: Scope) -> Result<(), (Line, String)> {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Break | StmtKind::Continue if !scope.in_loop => {
                let word = if matches!(stmt.kind, StmtKind::Break) {
                    "break"
                } else {
                    "continue"
                };
                return Err((stmt.line, format!("'{word}' outside a loop")));
            }
            StmtKind::Return(_) if !scope.in_function => {
                return Err((stmt.line, "'return' outside a function".to_string()));
            }
            StmtKind::FnDef(def) if scope.nested => {
                return Err((
                    stmt.line,
                    format!("function '{}' must be defined at top level", def.name),
                ));
            }
            StmtKind::If {
                branches,
                else_branch,
            } => {
                for branch in branches {
                    check_block(&branch.body, scope.nested())?;
                }
                if let Some(body) = else_branch {
                    check_block(body, scope.nested())?;
                }
            }
            StmtKind::While { body, .. } | StmtKind::For { body, .. } => {
                check_block(body, scope.looping())?;
            }
            _ => {}
        }
    }
    Ok(())
}
