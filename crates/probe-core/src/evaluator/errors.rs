use std::fmt;

use thiserror::Error;

use crate::ast::Line;

/// What went wrong while a program ran.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluatorError {
    #[error("Type error: {operation} requires {expected}, got {actual}")]
    TypeError {
        operation: String,
        expected: String,
        actual: String,
    },

    #[error("Type error: cannot {operation} {left_type} and {right_type}")]
    BinaryTypeError {
        operation: String,
        left_type: String,
        right_type: String,
    },

    #[error("Variable '{name}' not found")]
    VariableNotFound { name: String },

    #[error("'{name}' is a {type_name}, which cannot be called")]
    NotCallable { name: String, type_name: String },

    #[error("{type_name} has no method '{method}'")]
    MethodNotFound { type_name: String, method: String },

    #[error("{function}() takes {expected} arguments, got {actual}")]
    ArityMismatch {
        function: String,
        expected: String,
        actual: usize,
    },

    #[error("{function}() got an unexpected keyword argument '{keyword}'")]
    UnexpectedKeyword { function: String, keyword: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("Key {key:?} not found")]
    KeyNotFound { key: String },

    #[error("Integer overflow in {operation}")]
    Overflow { operation: String },

    #[error("Cannot unpack {actual} into {expected} names")]
    Unpack { expected: usize, actual: String },

    #[error("Call depth exceeded {limit}")]
    RecursionLimit { limit: usize },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Raised: {message}")]
    Raised { message: String },

    #[error("Output error: {0}")]
    Output(String),
}

impl EvaluatorError {
    /// Create a type error for unary operations
    pub fn unary_type_error(operation: &str, expected: &str, actual: &str) -> Self {
        Self::TypeError {
            operation: operation.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a type error for binary operations
    pub fn binary_type_error(operation: &str, left_type: &str, right_type: &str) -> Self {
        Self::BinaryTypeError {
            operation: operation.to_string(),
            left_type: left_type.to_string(),
            right_type: right_type.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    pub fn arity(function: &str, expected: impl Into<String>, actual: usize) -> Self {
        Self::ArityMismatch {
            function: function.to_string(),
            expected: expected.into(),
            actual,
        }
    }

    pub fn overflow(operation: &str) -> Self {
        Self::Overflow {
            operation: operation.to_string(),
        }
    }
}

/// An [`EvaluatorError`] located in the program that raised it.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    /// Name of the compiled unit
    pub unit: String,
    /// Line of the innermost statement executing when the error surfaced
    pub line: Option<Line>,
    pub kind: EvaluatorError,
}

impl RuntimeError {
    /// Attach `line` unless an inner statement already did.
    pub fn at(mut self, line: Line) -> Self {
        self.line.get_or_insert(line);
        self
    }

    pub fn in_unit(mut self, unit: &str) -> Self {
        if self.unit.is_empty() {
            self.unit = unit.to_string();
        }
        self
    }
}

impl From<EvaluatorError> for RuntimeError {
    fn from(kind: EvaluatorError) -> Self {
        Self {
            unit: String::new(),
            line: None,
            kind,
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}, line {}: {}", self.unit, line, self.kind),
            None => write!(f, "{}: {}", self.unit, self.kind),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

pub type EvalResult<T> = Result<T, RuntimeError>;
