//! Probe Runtime - the parse, rewrite, compile and execute pipeline
//!
//! Wraps the parser, rewriter, compiler and executor behind one call for
//! front ends such as the command-line tool.

use std::io::Write;

use tracing::info;

use crate::{
    compiler::compile,
    evaluator::{execute, ExecutionContext},
    parser::{create_parser, Parser},
    recorder::EventLog,
    selector::SelectorRegistry,
    storage::{DbInterface, DbResource},
    tracer::{RewriteSummary, Rewriter},
    Program, ProbeConfig, ProbeError, Result,
};

/// What the rewriter did to a program.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// The program as executed, hooks included
    pub program: Program,
    pub summary: RewriteSummary,
}

/// High-level probe runtime that combines parser, rewriter and executor
pub struct ProbeRuntime {
    config: ProbeConfig,
    parser: Box<dyn Parser>,
}

impl ProbeRuntime {
    /// Create a new runtime with the given configuration
    pub fn new(config: ProbeConfig) -> Result<Self> {
        config.validate()?;
        let parser = create_parser(&config.parser)
            .ok_or_else(|| ProbeError::Config(format!("unknown parser '{}'", config.parser)))?;
        Ok(Self { config, parser })
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Parse and rewrite `source` without running it. The registry is frozen
    /// from here on.
    pub fn instrument(&mut self, source: &str, registry: &mut SelectorRegistry) -> Result<RunReport> {
        let program = self.parser.parse(source)?;
        registry.freeze();
        let (program, summary) = Rewriter::new(registry).rewrite(program)?;
        Ok(RunReport { program, summary })
    }

    /// Instrument `source` and execute it as `unit_name`.
    ///
    /// The store is opened before the first statement runs and closed after
    /// the last one, whether the program completes or raises. Entries go to
    /// `log`, which keeps whatever was recorded before a failure.
    pub fn run(
        &mut self,
        source: &str,
        unit_name: &str,
        registry: &mut SelectorRegistry,
        store: &mut dyn DbInterface,
        log: &mut EventLog,
        output: &mut dyn Write,
    ) -> Result<RunReport> {
        let report = self.instrument(source, registry)?;
        let unit = compile(report.program.clone(), unit_name)?;

        let outcome = {
            let mut resource = DbResource::acquire(store)?;
            execute(
                &unit,
                ExecutionContext {
                    log: &mut *log,
                    resource: &mut resource,
                    output,
                    bindings: registry.hook_bindings(),
                    max_call_depth: self.config.max_call_depth,
                },
            )
        };

        info!(
            unit = unit_name,
            entries = log.len(),
            saved = log.saved_count(),
            completed = outcome.is_ok(),
            "run finished"
        );
        outcome?;
        Ok(report)
    }
}

impl Default for ProbeRuntime {
    fn default() -> Self {
        Self {
            config: ProbeConfig::default(),
            parser: Box::new(crate::parser::ProbeParser::new()),
        }
    }
}
