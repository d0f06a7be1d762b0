//! # Probe Core
//!
//! Selective instrumentation and execution of probe scripts:
//! - Program representation and parser
//! - Selector registry (line blocks and modifier method names)
//! - Rewriter that inserts logging hooks after selected statements
//! - Compiler and tree-walking executor
//! - Log aggregation with pluggable persistence
//!
//! A front end builds a [`SelectorRegistry`], picks a [`DbInterface`] and
//! hands both to [`ProbeRuntime::run`] together with the source text and an
//! [`EventLog`] it owns.

#![warn(clippy::all)]

pub mod ast;
pub mod compiler;
pub mod evaluator;
pub mod parser;
pub mod recorder;
pub mod selector;
pub mod storage;
pub mod tracer;

pub mod runtime;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use ast::{Line, Program, ToSource};
pub use compiler::{compile, CompileError, CompiledUnit};
pub use evaluator::{execute, EvaluatorError, ExecutionContext, RuntimeError, Value};
pub use parser::{create_parser, Parser, SyntaxError};
pub use recorder::{record, EventLog, LogEntry, LogRecord, RecordValue};
pub use runtime::{ProbeRuntime, RunReport};
pub use selector::{Block, ConfigurationError, HookBindings, SelectorRegistry};
pub use storage::{
    DbInterface, DbResource, MemoryStore, PersistenceError, RecordKey, SledStore,
};
pub use tracer::{RewriteSummary, Rewriter};

/// Probe version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for probe components. `RUST_LOG` wins over
/// `default_directive` when set. Events go to stderr so they never mix with
/// program output.
pub fn init_tracing(default_directive: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    // A second initialisation (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Probe runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Database storage path
    pub storage_path: PathBuf,
    /// Enable debug mode
    pub debug: bool,
    /// Maximum nested function calls
    pub max_call_depth: usize,
    /// Parser registered under this name in [`create_parser`]
    pub parser: String,
    /// Names used by synthesised hook calls
    pub hook_bindings: HookBindings,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            storage_path: "./probe-db".into(),
            debug: false,
            max_call_depth: evaluator::DEFAULT_MAX_CALL_DEPTH,
            parser: "probe".to_string(),
            hook_bindings: HookBindings::default(),
        }
    }
}

impl ProbeConfig {
    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ProbeError::Config(format!("{}: {e}", path.display())))?;
        let config: ProbeConfig = serde_json::from_str(&text)
            .map_err(|e| ProbeError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_call_depth == 0 {
            return Err(ProbeError::Config(
                "max_call_depth must be at least 1".to_string(),
            ));
        }
        self.hook_bindings.validate()?;
        Ok(())
    }
}

/// Error types for probe core operations
#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    /// Invalid selectors or hook bindings
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Unreadable or invalid configuration file
    #[error("Configuration error: {0}")]
    Config(String),

    /// Parser error
    #[error("Parse error: {0}")]
    Parse(#[from] SyntaxError),

    /// Malformed program tree
    #[error("Tree error: {0}")]
    Tree(#[from] ast::TreeError),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// The instrumented program raised
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// The persistence resource could not be acquired
    #[error("Storage error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Result type for probe core operations
pub type Result<T> = std::result::Result<T, ProbeError>;
