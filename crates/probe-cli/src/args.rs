//! Command-line surface of the `probe` binary.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use probe_core::Block;

/// Options for one `probe` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CliOptions {
    pub file: PathBuf,
    pub blocks: Vec<Block>,
    pub modifiers: Vec<String>,
    /// Overrides the configured storage path
    pub database: Option<PathBuf>,
    /// Keep records in memory instead of a sled database
    pub memory: bool,
    pub config: Option<PathBuf>,
    /// Print the instrumented program before running it
    pub dump: bool,
    pub debug: bool,
}

pub fn command() -> Command {
    Command::new("probe")
        .version(probe_core::VERSION)
        .about("Run a probe script and record the values of selected lines and modifier calls")
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .help("Probe script to run")
                .value_parser(clap::value_parser!(PathBuf))
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("blocks")
                .short('b')
                .long("blocks")
                .value_name("(START,END)")
                .help("Line blocks to instrument, end exclusive")
                .value_parser(|s: &str| s.parse::<Block>())
                .num_args(1..)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("modifiers")
                .short('m')
                .long("modifiers")
                .value_name("NAME")
                .help("Method names whose receiver is logged after each call (ex: append)")
                .num_args(1..)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("database")
                .long("db")
                .value_name("PATH")
                .help("Database directory path")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("memory")
                .long("memory")
                .help("Keep records in memory only")
                .action(ArgAction::SetTrue)
                .conflicts_with("database"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("dump")
                .long("dump")
                .help("Print the instrumented program before running it")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Enable debug mode")
                .action(ArgAction::SetTrue),
        )
}

impl CliOptions {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let file = matches
            .get_one::<PathBuf>("file")
            .cloned()
            .context("missing script file")?;
        Ok(Self {
            file,
            blocks: matches
                .get_many::<Block>("blocks")
                .map(|blocks| blocks.copied().collect())
                .unwrap_or_default(),
            modifiers: matches
                .get_many::<String>("modifiers")
                .map(|names| names.cloned().collect())
                .unwrap_or_default(),
            database: matches.get_one::<PathBuf>("database").cloned(),
            memory: matches.get_flag("memory"),
            config: matches.get_one::<PathBuf>("config").cloned(),
            dump: matches.get_flag("dump"),
            debug: matches.get_flag("debug"),
        })
    }

    /// Parse from an explicit argument list, program name first.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = command().try_get_matches_from(args)?;
        Self::from_matches(&matches)
    }
}
