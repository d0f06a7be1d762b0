// Source code generation from the AST.
// Used to name modifier-call receivers ("grid[0]") and to dump an instrumented
// program in a readable form. Capture reads render as `$N`, which the parser
// does not accept: a dump is for reading, not for re-parsing.

use super::*;

/// Trait for types that can generate their source code representation
pub trait ToSource {
    fn to_source(&self) -> String;
}

const INDENT: &str = "  ";

impl ToSource for Program {
    fn to_source(&self) -> String {
        let mut out = String::new();
        write_block(&mut out, &self.statements, 0);
        out
    }
}

impl ToSource for Stmt {
    fn to_source(&self) -> String {
        let mut out = String::new();
        write_stmt(&mut out, self, 0);
        out.trim_end().to_string()
    }
}

impl ToSource for Expr {
    fn to_source(&self) -> String {
        match self {
            Expr::None => "none".to_string(),
            Expr::Bool(b) => b.to_string(),
            Expr::Int(n) => n.to_string(),
            Expr::Float(f) => format_float(*f),
            Expr::Str(s) => quote(s),
            Expr::Identifier(name) => name.clone(),
            Expr::List(items) => format!("[{}]", join(items.iter().map(|e| e.to_source()))),
            Expr::Map(entries) => format!(
                "{{{}}}",
                join(
                    entries
                        .iter()
                        .map(|(k, v)| format!("{}: {}", k.to_source(), v.to_source()))
                )
            ),
            Expr::Binary { op, left, right } => {
                let prec = op.precedence();
                format!(
                    "{} {} {}",
                    operand(left, prec, false),
                    op.symbol(),
                    operand(right, prec, true)
                )
            }
            Expr::Logical { op, left, right } => {
                let prec = self.precedence();
                let word = match op {
                    LogicalOp::And => "and",
                    LogicalOp::Or => "or",
                };
                format!(
                    "{} {word} {}",
                    operand(left, prec, false),
                    operand(right, prec, true)
                )
            }
            Expr::Unary { op, operand: inner } => match op {
                UnaryOp::Neg => format!("-{}", operand(inner, self.precedence(), false)),
                UnaryOp::Not => format!("not {}", operand(inner, self.precedence(), false)),
            },
            Expr::Call { callee, args } => format!("{callee}({})", arguments(args)),
            Expr::MethodCall {
                receiver,
                method,
                args,
                ..
            } => format!(
                "{}.{method}({})",
                operand(receiver, 8, false),
                arguments(args)
            ),
            Expr::Index { object, index } => {
                format!("{}[{}]", operand(object, 8, false), index.to_source())
            }
            Expr::Capture(slot) => slot.to_string(),
        }
    }
}

fn join(parts: impl Iterator<Item = String>) -> String {
    parts.collect::<Vec<_>>().join(", ")
}

fn arguments(args: &[Argument]) -> String {
    join(args.iter().map(|arg| match &arg.keyword {
        Some(keyword) => format!("{keyword}={}", arg.value.to_source()),
        None => arg.value.to_source(),
    }))
}

// Parenthesize a child whose binding is looser than its parent. Right operands
// of left-associative operators also need parentheses at equal precedence.
fn operand(expr: &Expr, parent: u8, right: bool) -> String {
    let prec = expr.precedence();
    if prec < parent || (right && prec == parent && prec < 8) {
        format!("({})", expr.to_source())
    } else {
        expr.to_source()
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn write_block(out: &mut String, stmts: &[Stmt], depth: usize) {
    for stmt in stmts {
        write_stmt(out, stmt, depth);
    }
}

fn write_line(out: &mut String, depth: usize, text: &str) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    out.push_str(text);
    out.push('\n');
}

fn write_stmt(out: &mut String, stmt: &Stmt, depth: usize) {
    match &stmt.kind {
        StmtKind::Assign { targets, value } => write_line(
            out,
            depth,
            &format!("{} = {}", targets.join(", "), value.to_source()),
        ),
        StmtKind::AugAssign { target, op, value } => write_line(
            out,
            depth,
            &format!("{target} {}= {}", op.symbol(), value.to_source()),
        ),
        StmtKind::IndexAssign {
            object,
            index,
            value,
        } => write_line(
            out,
            depth,
            &format!(
                "{}[{}] = {}",
                object.to_source(),
                index.to_source(),
                value.to_source()
            ),
        ),
        StmtKind::Expr(expr) => write_line(out, depth, &expr.to_source()),
        StmtKind::If {
            branches,
            else_branch,
        } => {
            for (i, branch) in branches.iter().enumerate() {
                let keyword = if i == 0 { "if" } else { "elseif" };
                write_line(
                    out,
                    depth,
                    &format!("{keyword} {}", branch.condition.to_source()),
                );
                write_block(out, &branch.body, depth + 1);
            }
            if let Some(body) = else_branch {
                write_line(out, depth, "else");
                write_block(out, body, depth + 1);
            }
            write_line(out, depth, "endif");
        }
        StmtKind::While { condition, body } => {
            write_line(out, depth, &format!("while {}", condition.to_source()));
            write_block(out, body, depth + 1);
            write_line(out, depth, "endwhile");
        }
        StmtKind::For {
            variable,
            iterable,
            body,
        } => {
            write_line(
                out,
                depth,
                &format!("for {variable} in {}", iterable.to_source()),
            );
            write_block(out, body, depth + 1);
            write_line(out, depth, "endfor");
        }
        StmtKind::FnDef(def) => {
            write_line(
                out,
                depth,
                &format!("fn {}({})", def.name, def.params.join(", ")),
            );
            write_block(out, &def.body, depth + 1);
            write_line(out, depth, "endfn");
        }
        StmtKind::Return(None) => write_line(out, depth, "return"),
        StmtKind::Return(Some(value)) => {
            write_line(out, depth, &format!("return {}", value.to_source()))
        }
        StmtKind::Break => write_line(out, depth, "break"),
        StmtKind::Continue => write_line(out, depth, "continue"),
        StmtKind::Raise(value) => write_line(out, depth, &format!("raise {}", value.to_source())),
    }
}
