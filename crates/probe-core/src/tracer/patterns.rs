/*!
# Expression Walking

Traversals over expression trees in evaluation order. Children are visited
before their parent, so a call is seen after everything it evaluates first.
*/

use crate::ast::{Expr, Stmt, StmtKind};

/// Visit `expr` and its sub-expressions in post-order, matching the order in
/// which the evaluator completes them.
pub fn walk_post_order_mut(expr: &mut Expr, visit: &mut dyn FnMut(&mut Expr)) {
    match expr {
        Expr::List(items) => {
            for item in items {
                walk_post_order_mut(item, visit);
            }
        }
        Expr::Map(entries) => {
            for (key, value) in entries {
                walk_post_order_mut(key, visit);
                walk_post_order_mut(value, visit);
            }
        }
        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            walk_post_order_mut(left, visit);
            walk_post_order_mut(right, visit);
        }
        Expr::Unary { operand, .. } => walk_post_order_mut(operand, visit),
        Expr::Call { args, .. } => {
            for arg in args {
                walk_post_order_mut(&mut arg.value, visit);
            }
        }
        Expr::MethodCall { receiver, args, .. } => {
            walk_post_order_mut(receiver, visit);
            for arg in args {
                walk_post_order_mut(&mut arg.value, visit);
            }
        }
        Expr::Index { object, index } => {
            walk_post_order_mut(object, visit);
            walk_post_order_mut(index, visit);
        }
        Expr::None
        | Expr::Bool(_)
        | Expr::Int(_)
        | Expr::Float(_)
        | Expr::Str(_)
        | Expr::Identifier(_)
        | Expr::Capture(_) => {}
    }
    visit(expr);
}

/// Expressions a statement evaluates itself, in evaluation order. Nested
/// statement bodies are not included.
pub fn own_expressions_mut(stmt: &mut Stmt) -> Vec<&mut Expr> {
    match &mut stmt.kind {
        StmtKind::Assign { value, .. } | StmtKind::AugAssign { value, .. } => vec![value],
        // Value first, then the container, then the index
        StmtKind::IndexAssign {
            object,
            index,
            value,
        } => vec![value, object, index],
        StmtKind::Expr(expr) | StmtKind::Raise(expr) => vec![expr],
        StmtKind::Return(value) => value.iter_mut().collect(),
        StmtKind::If { branches, .. } => branches
            .iter_mut()
            .map(|branch| &mut branch.condition)
            .collect(),
        StmtKind::While { condition, .. } => vec![condition],
        StmtKind::For { iterable, .. } => vec![iterable],
        StmtKind::FnDef(_) | StmtKind::Break | StmtKind::Continue => Vec::new(),
    }
}

/// Where hooks observing the calls in a statement's own expressions go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPlacement {
    /// Directly after the statement
    After,
    /// At the head of every nested body and again after the statement. The
    /// first hook to run consumes the capture; later copies find it empty.
    BodiesAndAfter,
    /// Control leaves the statement, so there is nowhere to hook
    Nowhere,
}

pub fn hook_placement(stmt: &Stmt) -> HookPlacement {
    match stmt.kind {
        StmtKind::Assign { .. }
        | StmtKind::AugAssign { .. }
        | StmtKind::IndexAssign { .. }
        | StmtKind::Expr(_) => HookPlacement::After,
        StmtKind::If { .. } | StmtKind::While { .. } | StmtKind::For { .. } => {
            HookPlacement::BodiesAndAfter
        }
        StmtKind::Return(_)
        | StmtKind::Raise(_)
        | StmtKind::FnDef(_)
        | StmtKind::Break
        | StmtKind::Continue => HookPlacement::Nowhere,
    }
}

/// Statement bodies nested directly inside `stmt`.
pub fn child_blocks_mut(stmt: &mut Stmt) -> Vec<&mut Vec<Stmt>> {
    match &mut stmt.kind {
        StmtKind::If {
            branches,
            else_branch,
        } => branches
            .iter_mut()
            .map(|branch| &mut branch.body)
            .chain(else_branch.iter_mut())
            .collect(),
        StmtKind::While { body, .. } | StmtKind::For { body, .. } => vec![body],
        StmtKind::FnDef(def) => vec![&mut def.body],
        _ => Vec::new(),
    }
}
