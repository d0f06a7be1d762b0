//! Selection of the program sites that get instrumented.
//!
//! A [`SelectorRegistry`] holds the configured line [`Block`]s, the modifier
//! method names matched regardless of line, and the [`HookBindings`] the
//! rewriter uses when it synthesises hook calls.

pub mod block;
pub mod registry;

pub use block::Block;
pub use registry::{HookBindings, SelectorRegistry};

use crate::ast::Line;

/// Invalid selector input. Fatal, raised before anything executes.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("block ({start},{end}) must satisfy start < end")]
    EmptyBlock { start: Line, end: Line },

    #[error("blocks must be written as '(start,end)', got '{input}'")]
    MalformedBlock { input: String },

    #[error("'{name}' is not a valid modifier name")]
    InvalidModifier { name: String },

    #[error("hook binding '{name}' is not a valid identifier")]
    InvalidBinding { name: String },

    #[error("hook bindings must be distinct, '{name}' is used twice")]
    DuplicateBinding { name: String },

    #[error("selector registry is frozen once execution begins")]
    Frozen,
}
