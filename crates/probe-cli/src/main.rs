use std::io;

use anyhow::Result;
use probe_cli::{command, CliOptions};
use probe_core::init_tracing;

fn main() -> Result<()> {
    let matches = command().get_matches();
    let options = CliOptions::from_matches(&matches)?;
    let config = probe_cli::load_config(&options)?;

    // Initialize logging
    init_tracing(probe_cli::log_directive(&config));

    let stdout = io::stdout();
    let mut out = stdout.lock();
    probe_cli::run_with_config(&options, config, &mut out)?;
    Ok(())
}
