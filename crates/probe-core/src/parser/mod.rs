// Parser module - turns probe script source into the program representation
use crate::ast::{Line, Program};

pub mod grammar;
mod probe;

pub use probe::ProbeParser;


/// Malformed source text. Always fatal, raised before any rewriting.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("line {line}, column {column}: {message}")]
pub struct SyntaxError {
    pub line: Line,
    pub column: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(line: Line, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

/// Trait for probe script parsers
pub trait Parser: Send + Sync {
    /// Parse a whole source unit into a program
    fn parse(&mut self, source: &str) -> Result<Program, SyntaxError>;

    /// Get parser name for debugging
    fn name(&self) -> &'static str;
}

/// Create a parser based on type
pub fn create_parser(parser_type: &str) -> Option<Box<dyn Parser>> {
    match parser_type {
        "probe" => Some(Box::new(ProbeParser::new())),
        _ => None,
    }
}
