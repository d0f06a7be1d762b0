use pretty_assertions::assert_eq;

use super::*;
use crate::ast::{Program, Stmt, StmtKind, ToSource};
use crate::parser::{Parser, ProbeParser};
use crate::selector::{Block, HookBindings, SelectorRegistry};

fn parse(source: &str) -> Program {
    ProbeParser::new().parse(source).unwrap()
}

fn registry(blocks: &[(u32, u32)], modifiers: &[&str]) -> SelectorRegistry {
    let mut registry = SelectorRegistry::new();
    registry
        .add_blocks(blocks.iter().map(|&(s, e)| Block::new(s, e).unwrap()))
        .unwrap();
    registry.add_modifier_names(modifiers.iter().copied()).unwrap();
    registry
}

fn rewrite(source: &str, registry: &SelectorRegistry) -> (Program, RewriteSummary) {
    Rewriter::new(registry).rewrite(parse(source)).unwrap()
}

#[test]
fn test_binding_hooks_respect_block_bounds() {
    let source = "a = 0\nb = 1\nx = 1\ny = x + 1\nz = 2\n";
    let (program, summary) = rewrite(source, &registry(&[(3, 5)], &[]));
    assert_eq!(
        program.to_source(),
        "a = 0\nb = 1\nx = 1\n\
         log_variable(val=x, name=\"x\", lineno=3, db=db)\n\
         y = x + 1\n\
         log_variable(val=y, name=\"y\", lineno=4, db=db)\n\
         z = 2\n"
    );
    assert_eq!(summary.bindings, 2);
    assert_eq!(summary.modifier_calls, 0);
}

#[test]
fn test_hooks_carry_the_statement_line() {
    let (program, _) = rewrite("\nx = 1\n", &registry(&[(1, 10)], &[]));
    assert_eq!(program.statements.len(), 2);
    assert_eq!(program.statements[1].line, 2);
}

#[test]
fn test_destructuring_hooks_each_name_in_order() {
    let (program, summary) = rewrite("a, b = [1, 2]\n", &registry(&[(1, 2)], &[]));
    assert_eq!(summary.bindings, 2);
    let rendered = program.to_source();
    let a = rendered.find("name=\"a\"").unwrap();
    let b = rendered.find("name=\"b\"").unwrap();
    assert!(a < b);
}

#[test]
fn test_augmented_assignment_is_a_binding() {
    let (program, summary) = rewrite("n = 0\nn += 2\n", &registry(&[(2, 3)], &[]));
    assert_eq!(summary.bindings, 1);
    assert_eq!(
        program.statements[2].to_source(),
        "log_variable(val=n, name=\"n\", lineno=2, db=db)"
    );
}

#[test]
fn test_index_assignment_is_not_a_binding() {
    let (_, summary) = rewrite("m = {}\nm[\"k\"] = 1\n", &registry(&[(1, 3)], &[]));
    assert_eq!(summary.bindings, 1);
}

#[test]
fn test_modifier_call_is_captured() {
    let (program, summary) = rewrite("items = []\nitems.append(5)\n", &registry(&[], &["append"]));
    assert_eq!(summary.modifier_calls, 1);
    assert_eq!(
        program.to_source(),
        "items = []\nitems.append(5)\nlog_variable(val=$0, name=\"items\", lineno=2, db=db)\n"
    );
    let StmtKind::Expr(Expr::MethodCall { capture, .. }) = &program.statements[1].kind else {
        panic!("expected the original call");
    };
    assert_eq!(*capture, Some(crate::ast::CaptureSlot(0)));
}

#[test]
fn test_modifier_then_binding_on_one_line() {
    let (program, summary) = rewrite(
        "stack = [1, 2]\ntop = stack.pop()\n",
        &registry(&[(2, 3)], &["pop"]),
    );
    assert_eq!(summary.hooks_inserted(), 2);
    let hooks: Vec<String> = program.statements[2..]
        .iter()
        .map(Stmt::to_source)
        .collect();
    assert_eq!(
        hooks,
        vec![
            "log_variable(val=$0, name=\"stack\", lineno=2, db=db)".to_string(),
            "log_variable(val=top, name=\"top\", lineno=2, db=db)".to_string(),
        ]
    );
}

#[test]
fn test_nested_modifier_calls_follow_completion_order() {
    let (program, summary) = rewrite("a.append(b.pop())\n", &registry(&[], &["append", "pop"]));
    assert_eq!(summary.modifier_calls, 2);
    assert_eq!(
        program.statements[1].to_source(),
        "log_variable(val=$0, name=\"b\", lineno=1, db=db)"
    );
    assert_eq!(
        program.statements[2].to_source(),
        "log_variable(val=$1, name=\"a\", lineno=1, db=db)"
    );
}

#[test]
fn test_receiver_expression_names_the_binding() {
    let (program, _) = rewrite("grid[0].append(1)\n", &registry(&[], &["append"]));
    assert_eq!(
        program.statements[1].to_source(),
        "log_variable(val=$0, name=\"grid[0]\", lineno=1, db=db)"
    );
}

#[test]
fn test_loop_header_calls_hook_body_head_and_exit() {
    let source = "while queue.pop()\nqueue.append(1)\nendwhile\nfor v in items.copy()\nendfor\n";
    let (program, summary) = rewrite(source, &registry(&[], &["pop", "append", "copy"]));
    assert_eq!(summary.skipped_modifier_calls, 0);
    assert_eq!(summary.modifier_calls, 3);
    assert_eq!(program.statements.len(), 4);

    let StmtKind::While { body, .. } = &program.statements[0].kind else {
        panic!("expected while loop");
    };
    let body: Vec<String> = body.iter().map(ToSource::to_source).collect();
    assert_eq!(
        body,
        vec![
            "log_variable(val=$1, name=\"queue\", lineno=1, db=db)",
            "queue.append(1)",
            "log_variable(val=$0, name=\"queue\", lineno=2, db=db)",
        ]
    );
    assert_eq!(
        program.statements[1].to_source(),
        "log_variable(val=$1, name=\"queue\", lineno=1, db=db)"
    );

    let StmtKind::For { body, .. } = &program.statements[2].kind else {
        panic!("expected for loop");
    };
    assert_eq!(body.len(), 1);
    assert_eq!(
        program.statements[3].to_source(),
        "log_variable(val=$2, name=\"items\", lineno=4, db=db)"
    );
}

#[test]
fn test_every_branch_sees_every_condition_call() {
    let source = "if a.pop() == 1\n  x = 1\nelseif b.pop() == 2\n  x = 2\nelse\n  x = 3\nendif\n";
    let (program, summary) = rewrite(source, &registry(&[], &["pop"]));
    assert_eq!(summary.modifier_calls, 2);
    assert_eq!(program.statements.len(), 3);

    let StmtKind::If {
        branches,
        else_branch,
    } = &program.statements[0].kind
    else {
        panic!("expected if statement");
    };
    let else_body = else_branch.as_ref().unwrap();
    for body in branches.iter().map(|b| &b.body).chain([else_body]) {
        assert_eq!(body.len(), 3);
        assert_eq!(
            body[1].to_source(),
            "log_variable(val=$1, name=\"b\", lineno=1, db=db)"
        );
    }
}

#[test]
fn test_calls_in_return_and_raise_are_skipped() {
    let source = "fn f(q)\n  return q.pop()\nendfn\nraise q.pop()\n";
    let (program, summary) = rewrite(source, &registry(&[], &["pop"]));
    assert_eq!(summary.skipped_modifier_calls, 2);
    assert_eq!(summary.modifier_calls, 0);
    assert_eq!(program.statements.len(), 2);
}

#[test]
fn test_bodies_are_instrumented() {
    let source = "fn f(x)\n  y = x * 2\n  return y\nendfn\nfor i in range(3)\n  total = i\nendfor\n";
    let (program, summary) = rewrite(source, &registry(&[(1, 10)], &[]));
    assert_eq!(summary.bindings, 2);
    let StmtKind::FnDef(def) = &program.statements[0].kind else {
        panic!("expected function");
    };
    assert_eq!(def.body.len(), 3);
    // the loop variable itself is not a binding site
    let StmtKind::For { body, .. } = &program.statements[1].kind else {
        panic!("expected for loop");
    };
    assert_eq!(body.len(), 2);
}

#[test]
fn test_nothing_selected_is_identity() {
    let source = "x = 1\nitems.append(x)\nif x\n  y = 2\nendif\n";
    let original = parse(source);

    let (unchanged, summary) = rewrite(source, &SelectorRegistry::new());
    assert_eq!(unchanged, original);
    assert_eq!(summary, RewriteSummary::default());

    // selectors that match nothing also leave the tree as it was
    let (unchanged, summary) = rewrite(source, &registry(&[(40, 50)], &["extend"]));
    assert_eq!(unchanged, original);
    assert_eq!(summary.hooks_inserted(), 0);
}

#[test]
fn test_custom_hook_bindings() {
    let bindings = HookBindings {
        hook: "trace".into(),
        resource: "store".into(),
        ..HookBindings::default()
    };
    let mut registry = SelectorRegistry::with_bindings(bindings).unwrap();
    registry.add_blocks([Block::new(1, 2).unwrap()]).unwrap();
    let (program, _) = Rewriter::new(&registry).rewrite(parse("x = 1")).unwrap();
    assert_eq!(
        program.statements[1].to_source(),
        "trace(val=x, name=\"x\", lineno=1, store=store)"
    );
}

#[test]
fn test_rule_context_allocates_fresh_slots() {
    let mut context = RuleContext::starting_at(4);
    assert_eq!(context.allocate_slot().0, 4);
    assert_eq!(context.allocate_slot().0, 5);
}
