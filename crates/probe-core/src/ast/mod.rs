// Program representation shared by the parser, the rewriter and the evaluator.
// The rewriter produces trees of the same shape it consumes, so every node is
// owned, cloneable and comparable.

pub mod source_gen;
pub mod validate;

pub use source_gen::ToSource;
pub use validate::{is_identifier, validate, TreeError};

#[cfg(test)]
mod source_gen_tests;

use serde::{Deserialize, Serialize};

/// 1-based source line number.
pub type Line = u32;

/// Words the parser never accepts as names.
pub const KEYWORDS: &[&str] = &[
    "if", "elseif", "else", "endif", "while", "endwhile", "for", "endfor", "in", "fn", "endfn",
    "return", "break", "continue", "raise", "and", "or", "not", "true", "false", "none",
];

/// Slot in which the evaluator stashes the receiver of an annotated method
/// call once the call completes. Only the rewriter creates these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CaptureSlot(pub u32);

impl std::fmt::Display for CaptureSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// A parsed (or rewritten) program: the top-level statement list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub line: Line,
    pub kind: StmtKind,
}

impl Stmt {
    pub fn new(line: Line, kind: StmtKind) -> Self {
        Self { line, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// x = e, or a, b = e (destructuring a list)
    Assign { targets: Vec<String>, value: Expr },
    /// x += e
    AugAssign {
        target: String,
        op: BinaryOp,
        value: Expr,
    },
    /// x[i] = e
    IndexAssign {
        object: Expr,
        index: Expr,
        value: Expr,
    },
    Expr(Expr),
    If {
        branches: Vec<CondBranch>,
        else_branch: Option<Vec<Stmt>>,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    For {
        variable: String,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    FnDef(FunctionDef),
    Return(Option<Expr>),
    Break,
    Continue,
    Raise(Expr),
}

impl StmtKind {
    /// Names a value-binding statement binds, in binding order.
    pub fn bound_names(&self) -> &[String] {
        match self {
            StmtKind::Assign { targets, .. } => targets,
            StmtKind::AugAssign { target, .. } => std::slice::from_ref(target),
            _ => &[],
        }
    }
}

/// One `if`/`elseif` arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CondBranch {
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    // Literals
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),

    Identifier(String),

    // Collections
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),

    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    /// f(args)
    Call { callee: String, args: Vec<Argument> },
    /// receiver.method(args)
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Argument>,
        line: Line,
        capture: Option<CaptureSlot>,
    },
    /// object[index]
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },

    /// Receiver stashed by the method call annotated with this slot
    Capture(CaptureSlot),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Identifier(name.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Str(value.into())
    }

    /// Binding precedence used when rendering source; higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            Expr::Logical {
                op: LogicalOp::Or, ..
            } => 1,
            Expr::Logical {
                op: LogicalOp::And,
                ..
            } => 2,
            Expr::Unary {
                op: UnaryOp::Not, ..
            } => 3,
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Unary {
                op: UnaryOp::Neg, ..
            } => 7,
            _ => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub keyword: Option<String>,
    pub value: Expr,
}

impl Argument {
    pub fn positional(value: Expr) -> Self {
        Self {
            keyword: None,
            value,
        }
    }

    pub fn keyword(name: impl Into<String>, value: Expr) -> Self {
        Self {
            keyword: Some(name.into()),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::In => "in",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "//" => BinaryOp::FloorDiv,
            "%" => BinaryOp::Mod,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "in" => BinaryOp::In,
            _ => return None,
        })
    }

    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge
            | BinaryOp::In => 4,
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}
