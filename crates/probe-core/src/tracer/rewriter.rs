use tracing::{debug, info};

use crate::ast::{validate, Argument, Expr, Line, Program, Stmt, StmtKind, TreeError};
use crate::selector::{HookBindings, SelectorRegistry};

use super::patterns::{
    child_blocks_mut, hook_placement, own_expressions_mut, walk_post_order_mut, HookPlacement,
};
use super::rules::{BindingRule, InstrumentationRule, ModifierRule};
use super::{HookSite, RewriteSummary, RuleContext, SiteKind};

/// Applies the instrumentation rules to a whole program.
pub struct Rewriter<'a> {
    rules: Vec<Box<dyn InstrumentationRule + 'a>>,
    bindings: &'a HookBindings,
    registry: &'a SelectorRegistry,
}

impl<'a> Rewriter<'a> {
    /// Rewriter with the modifier rule ahead of the binding rule.
    pub fn new(registry: &'a SelectorRegistry) -> Self {
        Self {
            rules: vec![
                Box::new(ModifierRule::new(registry)),
                Box::new(BindingRule::new(registry)),
            ],
            bindings: registry.hook_bindings(),
            registry,
        }
    }

    /// Instrument `program`. Both the input and the output must pass
    /// [`validate`]. With no selectors configured the input is returned as is.
    pub fn rewrite(&self, mut program: Program) -> Result<(Program, RewriteSummary), TreeError> {
        validate(&program)?;
        let mut summary = RewriteSummary::default();
        if self.registry.is_empty() {
            debug!("no selectors configured, program left untouched");
            return Ok((program, summary));
        }

        let mut context = RuleContext::starting_at(next_free_slot(&mut program.statements));
        let statements = self.rewrite_block(program.statements, &mut context, &mut summary);
        summary.skipped_modifier_calls = context.skipped_modifier_calls;

        let program = Program::new(statements);
        validate(&program)?;
        info!(
            bindings = summary.bindings,
            modifier_calls = summary.modifier_calls,
            skipped = summary.skipped_modifier_calls,
            "program instrumented"
        );
        Ok((program, summary))
    }

    fn rewrite_block(
        &self,
        statements: Vec<Stmt>,
        context: &mut RuleContext,
        summary: &mut RewriteSummary,
    ) -> Vec<Stmt> {
        let mut out = Vec::with_capacity(statements.len());
        for mut stmt in statements {
            for body in child_blocks_mut(&mut stmt) {
                let inner = std::mem::take(body);
                *body = self.rewrite_block(inner, context, summary);
            }

            let mut sites = Vec::new();
            for rule in &self.rules {
                let found = rule.instrument(&mut stmt, context);
                if !found.is_empty() {
                    debug!(rule = rule.name(), line = stmt.line, count = found.len(), "hook sites");
                }
                sites.extend(found);
            }

            let line = stmt.line;
            if hook_placement(&stmt) == HookPlacement::BodiesAndAfter {
                let heads: Vec<Stmt> = sites
                    .iter()
                    .filter(|site| site.kind == SiteKind::ModifierCall)
                    .map(|site| self.hook_call(line, site.clone()))
                    .collect();
                if !heads.is_empty() {
                    for body in child_blocks_mut(&mut stmt) {
                        body.splice(0..0, heads.iter().cloned());
                    }
                }
            }
            out.push(stmt);
            for site in sites {
                summary.count(site.kind);
                out.push(self.hook_call(line, site));
            }
        }
        out
    }

    /// `log_variable(val=<value>, name="<binding>", lineno=<line>, db=db)`
    fn hook_call(&self, line: Line, site: HookSite) -> Stmt {
        let b = self.bindings;
        Stmt::new(
            line,
            StmtKind::Expr(Expr::Call {
                callee: b.hook.clone(),
                args: vec![
                    Argument::keyword(b.value.as_str(), site.value),
                    Argument::keyword(b.name.as_str(), Expr::Str(site.binding)),
                    Argument::keyword(b.line.as_str(), Expr::Int(i64::from(site.line))),
                    Argument::keyword(b.resource.as_str(), Expr::ident(b.resource.as_str())),
                ],
            }),
        )
    }
}

/// First slot number not already used in `statements`.
fn next_free_slot(statements: &mut [Stmt]) -> u32 {
    fn scan(statements: &mut [Stmt], next: &mut u32) {
        for stmt in statements {
            for expr in own_expressions_mut(stmt) {
                walk_post_order_mut(expr, &mut |node| match node {
                    Expr::Capture(slot)
                    | Expr::MethodCall {
                        capture: Some(slot),
                        ..
                    } => *next = (*next).max(slot.0 + 1),
                    _ => {}
                });
            }
            for body in child_blocks_mut(stmt) {
                scan(body, next);
            }
        }
    }
    let mut next = 0;
    scan(statements, &mut next);
    next
}
