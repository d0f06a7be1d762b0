// Builds the program representation from the pest parse tree.

use pest::{error::LineColLocation, iterators::Pair, Parser as _};
use tracing::debug;

use super::{
    grammar::{ProbeGrammar, Rule},
    Parser, SyntaxError,
};
use crate::ast::{
    Argument, BinaryOp, CondBranch, Expr, FunctionDef, Line, LogicalOp, Program, Stmt, StmtKind,
    UnaryOp,
};

type ParseResult<T> = Result<T, SyntaxError>;

/// Parser for probe scripts, backed by the pest grammar in `probe.pest`
#[derive(Debug, Default)]
pub struct ProbeParser;

impl ProbeParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for ProbeParser {
    fn parse(&mut self, source: &str) -> ParseResult<Program> {
        let mut pairs = ProbeGrammar::parse(Rule::program, source).map_err(from_pest)?;
        let program = pairs
            .next()
            .ok_or_else(|| SyntaxError::new(1, 1, "empty parse tree"))?;
        let statements = build_statements(program)?;
        debug!(statements = statements.len(), "parsed program");
        Ok(Program::new(statements))
    }

    fn name(&self) -> &'static str {
        "probe"
    }
}

fn from_pest(err: pest::error::Error<Rule>) -> SyntaxError {
    let (line, column) = match err.line_col {
        LineColLocation::Pos(pos) => pos,
        LineColLocation::Span(start, _) => start,
    };
    SyntaxError::new(line as Line, column, err.variant.message().to_string())
}

fn line_of(pair: &Pair<'_, Rule>) -> Line {
    pair.as_span().start_pos().line_col().0 as Line
}

fn error_at(pair: &Pair<'_, Rule>, message: impl Into<String>) -> SyntaxError {
    let (line, column) = pair.as_span().start_pos().line_col();
    SyntaxError::new(line as Line, column, message)
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_if
            | Rule::kw_elseif
            | Rule::kw_else
            | Rule::kw_endif
            | Rule::kw_while
            | Rule::kw_endwhile
            | Rule::kw_for
            | Rule::kw_endfor
            | Rule::kw_in
            | Rule::kw_fn
            | Rule::kw_endfn
            | Rule::kw_return
            | Rule::kw_break
            | Rule::kw_continue
            | Rule::kw_raise
            | Rule::kw_and
            | Rule::kw_or
            | Rule::kw_not
    )
}

/// Children of a pair, minus keyword tokens
fn children<'i>(pair: Pair<'i, Rule>) -> impl Iterator<Item = Pair<'i, Rule>> {
    pair.into_inner().filter(|p| !is_keyword(p.as_rule()))
}

fn next_child<'i>(
    parent: &Pair<'i, Rule>,
    iter: &mut impl Iterator<Item = Pair<'i, Rule>>,
) -> ParseResult<Pair<'i, Rule>> {
    iter.next()
        .ok_or_else(|| error_at(parent, format!("incomplete {:?}", parent.as_rule())))
}

fn build_statements(pair: Pair<'_, Rule>) -> ParseResult<Vec<Stmt>> {
    children(pair)
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(build_stmt)
        .collect()
}

fn build_stmt(pair: Pair<'_, Rule>) -> ParseResult<Stmt> {
    let line = line_of(&pair);
    let rule = pair.as_rule();
    let whole = pair.clone();
    let mut inner = children(pair);

    let kind = match rule {
        Rule::fn_def => {
            let name = next_child(&whole, &mut inner)?.as_str().to_string();
            let mut params = Vec::new();
            let mut body = Vec::new();
            for part in inner {
                match part.as_rule() {
                    Rule::param_list => {
                        params = part.into_inner().map(|p| p.as_str().to_string()).collect()
                    }
                    Rule::block => body = build_statements(part)?,
                    _ => return Err(error_at(&part, "unexpected token in function definition")),
                }
            }
            StmtKind::FnDef(FunctionDef { name, params, body })
        }
        Rule::if_stmt => {
            let condition = build_expr(next_child(&whole, &mut inner)?)?;
            let body = build_statements(next_child(&whole, &mut inner)?)?;
            let mut branches = vec![CondBranch { condition, body }];
            let mut else_branch = None;
            for clause in inner {
                match clause.as_rule() {
                    Rule::elseif_clause => {
                        let clause_pair = clause.clone();
                        let mut parts = children(clause);
                        let condition = build_expr(next_child(&clause_pair, &mut parts)?)?;
                        let body = build_statements(next_child(&clause_pair, &mut parts)?)?;
                        branches.push(CondBranch { condition, body });
                    }
                    Rule::else_clause => {
                        let clause_pair = clause.clone();
                        let mut parts = children(clause);
                        else_branch =
                            Some(build_statements(next_child(&clause_pair, &mut parts)?)?);
                    }
                    _ => return Err(error_at(&clause, "unexpected token in if statement")),
                }
            }
            StmtKind::If {
                branches,
                else_branch,
            }
        }
        Rule::while_stmt => {
            let condition = build_expr(next_child(&whole, &mut inner)?)?;
            let body = build_statements(next_child(&whole, &mut inner)?)?;
            StmtKind::While { condition, body }
        }
        Rule::for_stmt => {
            let variable = next_child(&whole, &mut inner)?.as_str().to_string();
            let iterable = build_expr(next_child(&whole, &mut inner)?)?;
            let body = build_statements(next_child(&whole, &mut inner)?)?;
            StmtKind::For {
                variable,
                iterable,
                body,
            }
        }
        Rule::return_stmt => StmtKind::Return(inner.next().map(build_expr).transpose()?),
        Rule::break_stmt => StmtKind::Break,
        Rule::continue_stmt => StmtKind::Continue,
        Rule::raise_stmt => StmtKind::Raise(build_expr(next_child(&whole, &mut inner)?)?),
        Rule::assignment => {
            let targets = next_child(&whole, &mut inner)?
                .into_inner()
                .map(|p| p.as_str().to_string())
                .collect();
            let value = build_expr(next_child(&whole, &mut inner)?)?;
            StmtKind::Assign { targets, value }
        }
        Rule::aug_assignment => {
            let target = next_child(&whole, &mut inner)?.as_str().to_string();
            let op_pair = next_child(&whole, &mut inner)?;
            let op = BinaryOp::from_symbol(op_pair.as_str().trim_end_matches('='))
                .ok_or_else(|| error_at(&op_pair, "unknown augmented assignment operator"))?;
            let value = build_expr(next_child(&whole, &mut inner)?)?;
            StmtKind::AugAssign { target, op, value }
        }
        Rule::index_assignment => {
            let root = next_child(&whole, &mut inner)?;
            let mut object = Expr::Identifier(root.as_str().to_string());
            let mut indices = Vec::new();
            let mut value = None;
            for part in inner {
                match part.as_rule() {
                    Rule::index_suffix => indices.push(build_index(part)?),
                    _ => value = Some(build_expr(part)?),
                }
            }
            let index = indices
                .pop()
                .ok_or_else(|| error_at(&whole, "index assignment without an index"))?;
            for step in indices {
                object = Expr::Index {
                    object: Box::new(object),
                    index: Box::new(step),
                };
            }
            let value = value.ok_or_else(|| error_at(&whole, "index assignment without a value"))?;
            StmtKind::IndexAssign {
                object,
                index,
                value,
            }
        }
        Rule::expr_stmt => StmtKind::Expr(build_expr(next_child(&whole, &mut inner)?)?),
        other => return Err(error_at(&whole, format!("unexpected {other:?}"))),
    };

    Ok(Stmt::new(line, kind))
}

fn build_index(pair: Pair<'_, Rule>) -> ParseResult<Expr> {
    let whole = pair.clone();
    let mut inner = children(pair);
    build_expr(next_child(&whole, &mut inner)?)
}

fn build_expr(pair: Pair<'_, Rule>) -> ParseResult<Expr> {
    let whole = pair.clone();
    match pair.as_rule() {
        Rule::expression | Rule::positional => {
            let mut inner = children(pair);
            build_expr(next_child(&whole, &mut inner)?)
        }
        Rule::or_expr | Rule::and_expr => {
            let op = if whole.as_rule() == Rule::or_expr {
                LogicalOp::Or
            } else {
                LogicalOp::And
            };
            let mut inner = children(pair);
            let mut left = build_expr(next_child(&whole, &mut inner)?)?;
            for operand in inner {
                left = Expr::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(build_expr(operand)?),
                };
            }
            Ok(left)
        }
        Rule::not_expr => {
            let mut inner = children(pair);
            let operand = next_child(&whole, &mut inner)?;
            if operand.as_rule() == Rule::not_expr {
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(build_expr(operand)?),
                })
            } else {
                build_expr(operand)
            }
        }
        Rule::comparison | Rule::sum | Rule::product => {
            let mut inner = children(pair);
            let mut left = build_expr(next_child(&whole, &mut inner)?)?;
            while let Some(op_pair) = inner.next() {
                let op = BinaryOp::from_symbol(op_pair.as_str().trim())
                    .ok_or_else(|| error_at(&op_pair, "unknown operator"))?;
                let right = build_expr(next_child(&whole, &mut inner)?)?;
                left = Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                };
            }
            Ok(left)
        }
        Rule::unary => {
            let mut inner = children(pair);
            let first = next_child(&whole, &mut inner)?;
            if first.as_rule() == Rule::neg {
                let operand = build_expr(next_child(&whole, &mut inner)?)?;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                })
            } else {
                build_expr(first)
            }
        }
        Rule::postfix => {
            let mut inner = children(pair);
            let mut expr = build_expr(next_child(&whole, &mut inner)?)?;
            for suffix in inner {
                expr = match suffix.as_rule() {
                    Rule::method_suffix => {
                        let line = line_of(&suffix);
                        let suffix_pair = suffix.clone();
                        let mut parts = children(suffix);
                        let method = next_child(&suffix_pair, &mut parts)?.as_str().to_string();
                        let args = match parts.next() {
                            Some(list) => build_arguments(list)?,
                            None => Vec::new(),
                        };
                        Expr::MethodCall {
                            receiver: Box::new(expr),
                            method,
                            args,
                            line,
                            capture: None,
                        }
                    }
                    Rule::index_suffix => Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(build_index(suffix)?),
                    },
                    _ => return Err(error_at(&suffix, "unexpected suffix")),
                };
            }
            Ok(expr)
        }
        Rule::call => {
            let mut inner = children(pair);
            let callee = next_child(&whole, &mut inner)?.as_str().to_string();
            let args = match inner.next() {
                Some(list) => build_arguments(list)?,
                None => Vec::new(),
            };
            Ok(Expr::Call { callee, args })
        }
        Rule::list => Ok(Expr::List(
            children(pair).map(build_expr).collect::<ParseResult<_>>()?,
        )),
        Rule::map => {
            let mut entries = Vec::new();
            for entry in children(pair) {
                let entry_pair = entry.clone();
                let mut parts = children(entry);
                let key = build_expr(next_child(&entry_pair, &mut parts)?)?;
                let value = build_expr(next_child(&entry_pair, &mut parts)?)?;
                entries.push((key, value));
            }
            Ok(Expr::Map(entries))
        }
        Rule::ident => Ok(Expr::Identifier(pair.as_str().to_string())),
        Rule::int => pair
            .as_str()
            .parse::<i64>()
            .map(Expr::Int)
            .map_err(|_| error_at(&whole, "integer literal out of range")),
        Rule::float => pair
            .as_str()
            .parse::<f64>()
            .map(Expr::Float)
            .map_err(|_| error_at(&whole, "malformed float literal")),
        Rule::string => {
            let mut inner = children(pair);
            let body = next_child(&whole, &mut inner)?;
            Ok(Expr::Str(unescape(body.as_str())))
        }
        Rule::true_lit => Ok(Expr::Bool(true)),
        Rule::false_lit => Ok(Expr::Bool(false)),
        Rule::none_lit => Ok(Expr::None),
        other => Err(error_at(&whole, format!("unexpected {other:?} in expression"))),
    }
}

fn build_arguments(pair: Pair<'_, Rule>) -> ParseResult<Vec<Argument>> {
    let mut args = Vec::new();
    let mut seen_keyword = false;
    for arg in children(pair) {
        match arg.as_rule() {
            Rule::keyword_arg => {
                seen_keyword = true;
                let arg_pair = arg.clone();
                let mut parts = children(arg);
                let name = next_child(&arg_pair, &mut parts)?.as_str().to_string();
                let value = build_expr(next_child(&arg_pair, &mut parts)?)?;
                args.push(Argument::keyword(name, value));
            }
            _ => {
                if seen_keyword {
                    return Err(error_at(&arg, "positional argument follows keyword argument"));
                }
                args.push(Argument::positional(build_expr(arg)?));
            }
        }
    }
    Ok(args)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            // Unknown escapes keep their backslash
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
