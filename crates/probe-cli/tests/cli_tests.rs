use std::fs;

use pretty_assertions::assert_eq;
use probe_cli::CliOptions;
use probe_core::{Block, RecordValue};
use tempfile::TempDir;

fn script(dir: &TempDir, source: &str) -> String {
    let path = dir.path().join("script.probe");
    fs::write(&path, source).unwrap();
    path.display().to_string()
}

#[test]
fn test_parse_selectors() {
    let options = CliOptions::try_parse_from([
        "probe", "run.probe", "-b", "(3,5)", "(7,9)", "-m", "append", "pop", "--memory",
    ])
    .unwrap();
    assert_eq!(
        options.blocks,
        vec![Block::new(3, 5).unwrap(), Block::new(7, 9).unwrap()]
    );
    assert_eq!(options.modifiers, vec!["append", "pop"]);
    assert!(options.memory);
    assert!(!options.dump);
    assert_eq!(options.database, None);
}

#[test]
fn test_repeated_flags_accumulate() {
    let options =
        CliOptions::try_parse_from(["probe", "run.probe", "-b", "(1,2)", "-b", "(4,6)"]).unwrap();
    assert_eq!(options.blocks.len(), 2);
}

#[test]
fn test_rejects_bad_arguments() {
    assert!(CliOptions::try_parse_from(["probe", "run.probe", "-b", "(5,3)"]).is_err());
    assert!(CliOptions::try_parse_from(["probe", "run.probe", "-b", "5"]).is_err());
    assert!(CliOptions::try_parse_from(["probe", "run.probe", "--db", "x", "--memory"]).is_err());
    assert!(CliOptions::try_parse_from(["probe"]).is_err());
}

#[test]
fn test_run_prints_selectors_output_and_log() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "items = []\nitems.append(5)\nx = len(items)\nprint(x)\n");
    let options =
        CliOptions::try_parse_from(["probe", file.as_str(), "-b", "(3,4)", "-m", "append", "--memory"])
            .unwrap();

    let mut out = Vec::new();
    let log = probe_cli::run(&options, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(
        lines[..7],
        [
            "Lines checked:",
            "[(3,4)]",
            "Modifier functions logged:",
            "[append]",
            "Execution:",
            "1",
            "Log:",
        ]
    );
    assert_eq!(lines.len(), 9);
    assert!(lines[7].ends_with(": Saved items = [5] <list> (line 2)"));
    assert!(lines[8].ends_with(": Saved x = 1 <int> (line 3)"));
    assert_eq!(log.len(), 2);
    assert_eq!(log.entries()[1].record.value, RecordValue::Int(1));
}

#[test]
fn test_run_with_sled_database() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "x = 1\n");
    let db = dir.path().join("db").display().to_string();
    let options = CliOptions::try_parse_from(["probe", file.as_str(), "-b", "(1,2)", "--db", db.as_str()]).unwrap();

    let mut out = Vec::new();
    let log = probe_cli::run(&options, &mut out).unwrap();
    assert_eq!(log.saved_count(), 1);
    assert!(dir.path().join("db").exists());
}

#[test]
fn test_dump_shows_inserted_hooks() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "x = 1\n");
    let options =
        CliOptions::try_parse_from(["probe", file.as_str(), "-b", "(1,2)", "--memory", "--dump"]).unwrap();

    let mut out = Vec::new();
    probe_cli::run(&options, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains(
        "Instrumented program:\nx = 1\nlog_variable(val=x, name=\"x\", lineno=1, db=db)\nExecution:\n"
    ));
}

#[test]
fn test_config_file_renames_hook() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "x = 1\n");
    let config = dir.path().join("probe.json");
    fs::write(
        &config,
        r#"{"hook_bindings": {"hook": "trace", "resource": "store"}}"#,
    )
    .unwrap();
    let config = config.display().to_string();
    let options = CliOptions::try_parse_from([
        "probe", file.as_str(), "-b", "(1,2)", "--memory", "--dump", "--config", config.as_str(),
    ])
    .unwrap();

    let mut out = Vec::new();
    let log = probe_cli::run(&options, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("trace(val=x, name=\"x\", lineno=1, store=store)"));
    assert_eq!(log.saved_count(), 1);
}

#[test]
fn test_failing_program_is_not_reported() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "x = 1\nraise \"stop\"\n");
    let options = CliOptions::try_parse_from(["probe", file.as_str(), "-b", "(1,3)", "--memory"]).unwrap();

    let mut out = Vec::new();
    let err = probe_cli::run(&options, &mut out).unwrap_err();
    assert!(err.to_string().contains("stop"));
    let text = String::from_utf8(out).unwrap();
    assert!(text.ends_with("Execution:\n"));
}

#[test]
fn test_missing_file() {
    let options = CliOptions::try_parse_from(["probe", "/nonexistent/script.probe"]).unwrap();
    let err = probe_cli::run(&options, &mut Vec::<u8>::new()).unwrap_err();
    assert!(err.to_string().contains("cannot read"));
}

#[test]
fn test_config_file_debug_selects_debug_logging() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "x = 1\n");
    let config = dir.path().join("probe.json");
    fs::write(&config, r#"{"debug": true}"#).unwrap();
    let config = config.display().to_string();

    let options =
        CliOptions::try_parse_from(["probe", file.as_str(), "--config", config.as_str()]).unwrap();
    let loaded = probe_cli::load_config(&options).unwrap();
    assert!(loaded.debug);
    assert_eq!(
        probe_cli::log_directive(&loaded),
        "probe_core=debug,probe_cli=debug"
    );

    let options = CliOptions::try_parse_from(["probe", file.as_str()]).unwrap();
    let loaded = probe_cli::load_config(&options).unwrap();
    assert!(!loaded.debug);
    assert_eq!(probe_cli::log_directive(&loaded), "probe_core=info,probe_cli=info");
}
