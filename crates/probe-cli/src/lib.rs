//! Probe CLI - command-line runner for probe scripts
//!
//! Parses the selectors given on the command line, runs the script through
//! [`probe_core::ProbeRuntime`] and prints the captured log.

pub mod args;
pub mod report;

use std::{fs, io::Write};

use anyhow::{Context, Result};
use probe_core::{
    DbInterface, EventLog, MemoryStore, ProbeConfig, ProbeRuntime, SelectorRegistry, SledStore,
    ToSource,
};
use tracing::debug;

// Re-export commonly used types for convenience
pub use args::{command, CliOptions};
pub use report::{ConsoleReporter, Reporter};

/// Load the configuration file if one was given and apply flag overrides.
pub fn load_config(options: &CliOptions) -> Result<ProbeConfig> {
    let mut config = match &options.config {
        Some(path) => ProbeConfig::from_file(path)?,
        None => ProbeConfig::default(),
    };
    if let Some(path) = &options.database {
        config.storage_path = path.clone();
    }
    config.debug |= options.debug;
    Ok(config)
}

/// Tracing filter for the probe crates at the configured verbosity.
pub fn log_directive(config: &ProbeConfig) -> &'static str {
    if config.debug {
        "probe_core=debug,probe_cli=debug"
    } else {
        "probe_core=info,probe_cli=info"
    }
}

/// Run one script and write everything the user sees to `out`: the active
/// selectors, the program's own output and the log. A run that raises
/// returns the error before anything is reported.
pub fn run(options: &CliOptions, out: &mut dyn Write) -> Result<EventLog> {
    let config = load_config(options)?;
    run_with_config(options, config, out)
}

/// [`run`] with a configuration the caller already loaded.
pub fn run_with_config(
    options: &CliOptions,
    config: ProbeConfig,
    out: &mut dyn Write,
) -> Result<EventLog> {
    let source = fs::read_to_string(&options.file)
        .with_context(|| format!("cannot read {}", options.file.display()))?;

    let mut registry = SelectorRegistry::with_bindings(config.hook_bindings.clone())?;
    registry.add_blocks(options.blocks.iter().copied())?;
    registry.add_modifier_names(&options.modifiers)?;

    let blocks: Vec<String> = registry.blocks().iter().map(ToString::to_string).collect();
    let modifiers: Vec<&str> = registry.modifier_names().collect();
    writeln!(out, "Lines checked:")?;
    writeln!(out, "[{}]", blocks.join(", "))?;
    writeln!(out, "Modifier functions logged:")?;
    writeln!(out, "[{}]", modifiers.join(", "))?;

    let memory = options.memory;
    let storage_path = config.storage_path.clone();
    let mut runtime = ProbeRuntime::new(config)?;

    if options.dump {
        let report = runtime.instrument(&source, &mut registry)?;
        writeln!(out, "Instrumented program:")?;
        write!(out, "{}", report.program.to_source())?;
    }

    let mut store: Box<dyn DbInterface> = if memory {
        Box::new(MemoryStore::new())
    } else {
        Box::new(SledStore::new(&storage_path))
    };
    debug!(memory, path = %storage_path.display(), "record store selected");

    let unit_name = options.file.display().to_string();
    let mut log = EventLog::new();
    writeln!(out, "Execution:")?;
    runtime.run(
        &source,
        &unit_name,
        &mut registry,
        store.as_mut(),
        &mut log,
        &mut *out,
    )?;

    writeln!(out, "Log:")?;
    ConsoleReporter::new(&mut *out).report(&log)?;
    Ok(log)
}
