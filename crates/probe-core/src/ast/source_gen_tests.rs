use pretty_assertions::assert_eq;

use super::*;

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[test]
fn test_receiver_names() {
    let receiver = Expr::Index {
        object: Box::new(Expr::ident("grid")),
        index: Box::new(Expr::Int(0)),
    };
    assert_eq!(receiver.to_source(), "grid[0]");

    let call = Expr::MethodCall {
        receiver: Box::new(receiver),
        method: "append".into(),
        args: vec![Argument::positional(Expr::string("a\"b"))],
        line: 1,
        capture: Some(CaptureSlot(3)),
    };
    assert_eq!(call.to_source(), r#"grid[0].append("a\"b")"#);
}

#[test]
fn test_parenthesizes_only_where_needed() {
    // (a + b) * c keeps its parentheses, a + b * c needs none
    let grouped = binary(
        BinaryOp::Mul,
        binary(BinaryOp::Add, Expr::ident("a"), Expr::ident("b")),
        Expr::ident("c"),
    );
    assert_eq!(grouped.to_source(), "(a + b) * c");

    let natural = binary(
        BinaryOp::Add,
        Expr::ident("a"),
        binary(BinaryOp::Mul, Expr::ident("b"), Expr::ident("c")),
    );
    assert_eq!(natural.to_source(), "a + b * c");

    // a - (b - c) is not a - b - c
    let right_nested = binary(
        BinaryOp::Sub,
        Expr::ident("a"),
        binary(BinaryOp::Sub, Expr::ident("b"), Expr::ident("c")),
    );
    assert_eq!(right_nested.to_source(), "a - (b - c)");

    let receiver = Expr::MethodCall {
        receiver: Box::new(binary(BinaryOp::Add, Expr::ident("a"), Expr::ident("b"))),
        method: "copy".into(),
        args: vec![],
        line: 1,
        capture: None,
    };
    assert_eq!(receiver.to_source(), "(a + b).copy()");
}

#[test]
fn test_literals() {
    assert_eq!(Expr::Float(2.0).to_source(), "2.0");
    assert_eq!(Expr::Float(0.25).to_source(), "0.25");
    assert_eq!(Expr::None.to_source(), "none");
    assert_eq!(
        Expr::Map(vec![(Expr::string("k"), Expr::List(vec![Expr::Int(1), Expr::Bool(true)]))])
            .to_source(),
        r#"{"k": [1, true]}"#
    );
}

#[test]
fn test_hook_call_with_capture() {
    let hook = Stmt::new(
        4,
        StmtKind::Expr(Expr::Call {
            callee: "log_variable".into(),
            args: vec![
                Argument::keyword("val", Expr::Capture(CaptureSlot(0))),
                Argument::keyword("name", Expr::string("items")),
                Argument::keyword("lineno", Expr::Int(4)),
                Argument::keyword("db", Expr::ident("db")),
            ],
        }),
    );
    assert_eq!(
        hook.to_source(),
        r#"log_variable(val=$0, name="items", lineno=4, db=db)"#
    );
}

#[test]
fn test_program_layout() {
    let program = Program::new(vec![
        Stmt::new(
            1,
            StmtKind::FnDef(FunctionDef {
                name: "f".into(),
                params: vec!["a".into(), "b".into()],
                body: vec![Stmt::new(2, StmtKind::Return(Some(Expr::ident("a"))))],
            }),
        ),
        Stmt::new(
            4,
            StmtKind::If {
                branches: vec![CondBranch {
                    condition: Expr::Bool(true),
                    body: vec![Stmt::new(5, StmtKind::Break)],
                }],
                else_branch: Some(vec![Stmt::new(
                    7,
                    StmtKind::AugAssign {
                        target: "x".into(),
                        op: BinaryOp::Add,
                        value: Expr::Int(1),
                    },
                )]),
            },
        ),
    ]);
    assert_eq!(
        program.to_source(),
        "fn f(a, b)\n  return a\nendfn\nif true\n  break\nelse\n  x += 1\nendif\n"
    );
}
