/*!
# Rewriter - Selective Instrumentation

Turns a parsed program into an instrumented one by inserting hook calls after
the statements the selectors pick out.

## Overview

Two rules find hook sites, statement by statement:

1. **ModifierRule**: method calls whose name is a registered modifier, inside
   expression and assignment statements. Each call is annotated with a fresh
   [`CaptureSlot`](crate::ast::CaptureSlot) so the receiver is read once, by
   the call itself, and handed to the hook afterwards.
2. **BindingRule**: assignments and augmented assignments on lines inside a
   configured block, one hook per bound name.

Hooks are inserted directly after the statement they observe, modifier hooks
first (in the order the calls complete), then binding hooks. Calls in `if` and
`while` conditions or `for` iterables also get a copy of their hook at the head
of every nested body; the capture is read once, so only the first copy to run
reports. Calls in `return` and `raise` have nothing after them to hook; they
are left alone and counted as skipped.

## Example

```rust,ignore
let summary;
(program, summary) = Rewriter::new(&registry).rewrite(program)?;
```
*/

pub mod patterns;
pub mod rewriter;
pub mod rules;

pub use rewriter::Rewriter;
pub use rules::{BindingRule, InstrumentationRule, ModifierRule};

use serde::{Deserialize, Serialize};

use crate::ast::{CaptureSlot, Expr, Line};

/// One place a hook call is needed.
#[derive(Debug, Clone, PartialEq)]
pub struct HookSite {
    pub kind: SiteKind,
    /// Expression passed as the hook's value
    pub value: Expr,
    /// Binding name reported to the hook
    pub binding: String,
    pub line: Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiteKind {
    Binding,
    ModifierCall,
}

/// Per-run state shared by the rules.
#[derive(Debug, Default)]
pub struct RuleContext {
    next_slot: u32,
    /// Modifier calls found where no hook can follow them
    pub skipped_modifier_calls: usize,
}

impl RuleContext {
    pub fn starting_at(next_slot: u32) -> Self {
        Self {
            next_slot,
            skipped_modifier_calls: 0,
        }
    }

    pub fn allocate_slot(&mut self) -> CaptureSlot {
        let slot = CaptureSlot(self.next_slot);
        self.next_slot += 1;
        slot
    }
}

/// Counts of what a rewrite did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteSummary {
    /// Binding hooks inserted
    pub bindings: usize,
    /// Modifier-call hooks inserted
    pub modifier_calls: usize,
    /// Matching modifier calls left uninstrumented
    pub skipped_modifier_calls: usize,
}

impl RewriteSummary {
    pub fn hooks_inserted(&self) -> usize {
        self.bindings + self.modifier_calls
    }

    pub(crate) fn count(&mut self, kind: SiteKind) {
        match kind {
            SiteKind::Binding => self.bindings += 1,
            SiteKind::ModifierCall => self.modifier_calls += 1,
        }
    }
}

#[cfg(test)]
mod tests;
