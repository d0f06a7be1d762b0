/*!
# Instrumentation Rules

A rule inspects one statement at a time and reports the hook sites it wants.
Rules may annotate the statement in place (the modifier rule marks calls with
capture slots) but never add or remove statements; the rewriter does that.
*/

use crate::ast::{Expr, Stmt, ToSource};
use crate::selector::SelectorRegistry;

use super::patterns::{hook_placement, own_expressions_mut, walk_post_order_mut, HookPlacement};
use super::{HookSite, RuleContext, SiteKind};

/// Core trait for instrumentation rules
pub trait InstrumentationRule {
    /// Human-readable name for this rule
    fn name(&self) -> &'static str;

    /// Collect the hook sites for `stmt`, in the order the hooks should run.
    fn instrument(&self, stmt: &mut Stmt, context: &mut RuleContext) -> Vec<HookSite>;
}

/// Hooks every name bound by an assignment on a selected line.
pub struct BindingRule<'a> {
    registry: &'a SelectorRegistry,
}

impl<'a> BindingRule<'a> {
    pub fn new(registry: &'a SelectorRegistry) -> Self {
        Self { registry }
    }
}

impl InstrumentationRule for BindingRule<'_> {
    fn name(&self) -> &'static str {
        "binding"
    }

    fn instrument(&self, stmt: &mut Stmt, _context: &mut RuleContext) -> Vec<HookSite> {
        if !self.registry.matches_block(stmt.line) {
            return Vec::new();
        }
        stmt.kind
            .bound_names()
            .iter()
            .map(|name| HookSite {
                kind: SiteKind::Binding,
                value: Expr::ident(name.as_str()),
                binding: name.clone(),
                line: stmt.line,
            })
            .collect()
    }
}

/// Hooks calls to registered modifier methods, reporting the receiver as it
/// stands once the call returns.
pub struct ModifierRule<'a> {
    registry: &'a SelectorRegistry,
}

impl<'a> ModifierRule<'a> {
    pub fn new(registry: &'a SelectorRegistry) -> Self {
        Self { registry }
    }
}

impl InstrumentationRule for ModifierRule<'_> {
    fn name(&self) -> &'static str {
        "modifier"
    }

    fn instrument(&self, stmt: &mut Stmt, context: &mut RuleContext) -> Vec<HookSite> {
        let followable = hook_placement(stmt) != HookPlacement::Nowhere;
        let mut sites = Vec::new();
        for expr in own_expressions_mut(stmt) {
            walk_post_order_mut(expr, &mut |node| {
                let Expr::MethodCall {
                    receiver,
                    method,
                    line,
                    capture,
                    ..
                } = node
                else {
                    return;
                };
                if !self.registry.matches_modifier(method) {
                    return;
                }
                if !followable {
                    context.skipped_modifier_calls += 1;
                    return;
                }
                let slot = context.allocate_slot();
                *capture = Some(slot);
                sites.push(HookSite {
                    kind: SiteKind::ModifierCall,
                    value: Expr::Capture(slot),
                    binding: receiver.to_source(),
                    line: *line,
                });
            });
        }
        sites
    }
}
