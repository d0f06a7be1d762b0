//! End-to-end runs through parse, rewrite, compile and execute.

use pretty_assertions::assert_eq;

use probe_core::{
    Block, DbInterface, EventLog, LogRecord, MemoryStore, PersistenceError, ProbeConfig,
    ProbeError, ProbeRuntime, RecordKey, RecordValue, SelectorRegistry, ToSource,
};

/// Store whose saves fail on chosen attempts (1-based).
#[derive(Default)]
struct FlakyStore {
    failing: Vec<usize>,
    attempts: usize,
    saved: Vec<LogRecord>,
    opens: usize,
    closes: usize,
}

impl FlakyStore {
    fn failing_on(failing: &[usize]) -> Self {
        Self {
            failing: failing.to_vec(),
            ..Self::default()
        }
    }

    fn always_failing() -> Self {
        Self::failing_on(&(1..=1000).collect::<Vec<_>>())
    }
}

impl DbInterface for FlakyStore {
    fn open(&mut self) -> Result<(), PersistenceError> {
        self.opens += 1;
        Ok(())
    }

    fn save(&mut self, record: &LogRecord) -> Result<RecordKey, PersistenceError> {
        self.attempts += 1;
        if self.failing.contains(&self.attempts) {
            return Err(PersistenceError::Rejected {
                message: format!("attempt {} refused", self.attempts),
            });
        }
        self.saved.push(record.clone());
        Ok(RecordKey(self.saved.len() as u64 - 1))
    }

    fn close(&mut self) -> Result<(), PersistenceError> {
        self.closes += 1;
        Ok(())
    }
}

fn registry(blocks: &[(u32, u32)], modifiers: &[&str]) -> SelectorRegistry {
    let mut registry = SelectorRegistry::new();
    registry
        .add_blocks(blocks.iter().map(|&(s, e)| Block::new(s, e).unwrap()))
        .unwrap();
    registry.add_modifier_names(modifiers.iter().copied()).unwrap();
    registry
}

struct Run {
    result: Result<probe_core::RunReport, ProbeError>,
    log: EventLog,
    output: String,
}

fn run(source: &str, registry: &mut SelectorRegistry, store: &mut dyn DbInterface) -> Run {
    let mut runtime = ProbeRuntime::new(ProbeConfig::default()).unwrap();
    let mut log = EventLog::new();
    let mut output = Vec::new();
    let result = runtime.run(source, "script.probe", registry, store, &mut log, &mut output);
    Run {
        result,
        log,
        output: String::from_utf8(output).unwrap(),
    }
}

fn bindings(log: &EventLog) -> Vec<(String, Option<u32>)> {
    log.iter()
        .map(|entry| (entry.record.binding.clone(), entry.record.line))
        .collect()
}

#[test]
fn test_block_selects_lines_three_and_four() {
    let source = "a = 0\nb = 1\nx = 1\ny = x + 1\nz = 2\n";
    let mut store = MemoryStore::new();
    let run = run(source, &mut registry(&[(3, 5)], &[]), &mut store);

    let report = run.result.unwrap();
    assert_eq!(report.summary.bindings, 2);
    assert_eq!(
        bindings(&run.log),
        vec![("x".to_string(), Some(3)), ("y".to_string(), Some(4))]
    );
    let values: Vec<&RecordValue> = run.log.iter().map(|e| &e.record.value).collect();
    assert_eq!(values, vec![&RecordValue::Int(1), &RecordValue::Int(2)]);
    assert!(run.log.iter().all(|e| e.saved()));
}

#[test]
fn test_block_end_is_exclusive() {
    let source = "x = 1\ny = 2\n";
    let mut store = MemoryStore::new();
    let run = run(source, &mut registry(&[(1, 2)], &[]), &mut store);
    assert!(run.result.is_ok());
    assert_eq!(bindings(&run.log), vec![("x".to_string(), Some(1))]);
}

#[test]
fn test_modifier_records_receiver_after_call() {
    let source = "items = []\nitems.append(5)\nprint(items)\n";
    let mut store = MemoryStore::new();
    let run = run(source, &mut registry(&[], &["append"]), &mut store);

    assert!(run.result.is_ok());
    assert_eq!(run.output, "[5]\n");
    assert_eq!(run.log.len(), 1);
    let record = &run.log.entries()[0].record;
    assert_eq!(record.binding, "items");
    assert_eq!(record.line, Some(2));
    assert_eq!(record.value_type, "list");
    assert_eq!(record.value, RecordValue::List(vec![RecordValue::Int(5)]));
}

#[test]
fn test_modifier_and_binding_on_one_line() {
    let source = "stack = [1, 2]\ntop = stack.pop()\n";
    let mut store = MemoryStore::new();
    let run = run(source, &mut registry(&[(2, 3)], &["pop"]), &mut store);

    assert!(run.result.is_ok());
    assert_eq!(
        bindings(&run.log),
        vec![("stack".to_string(), Some(2)), ("top".to_string(), Some(2))]
    );
    assert_eq!(
        run.log.entries()[0].record.value,
        RecordValue::List(vec![RecordValue::Int(1)])
    );
    assert_eq!(run.log.entries()[1].record.value, RecordValue::Int(2));
}

#[test]
fn test_loop_produces_one_record_per_iteration() {
    let source = "total = 0\nfor i in range(4)\n  total += i\nendfor\n";
    let mut store = MemoryStore::new();
    let run = run(source, &mut registry(&[(3, 4)], &[]), &mut store);

    assert!(run.result.is_ok());
    let values: Vec<RecordValue> = run.log.iter().map(|e| e.record.value.clone()).collect();
    assert_eq!(
        values,
        vec![
            RecordValue::Int(0),
            RecordValue::Int(1),
            RecordValue::Int(3),
            RecordValue::Int(6)
        ]
    );
    assert_eq!(store.records().len(), 4);
}

#[test]
fn test_modifier_inside_function_body() {
    let source = "fn push(xs, v)\n  xs.append(v)\nendfn\ndata = []\npush(data, 1)\npush(data, 2)\n";
    let mut store = MemoryStore::new();
    let run = run(source, &mut registry(&[], &["append"]), &mut store);

    assert!(run.result.is_ok());
    assert_eq!(
        bindings(&run.log),
        vec![("xs".to_string(), Some(2)), ("xs".to_string(), Some(2))]
    );
    assert_eq!(
        run.log.entries()[1].record.value,
        RecordValue::List(vec![RecordValue::Int(1), RecordValue::Int(2)])
    );
}

#[test]
fn test_calls_in_loop_and_branch_conditions_record_once_each() {
    let source = "q = [0, 3, 5, 2, 4]\nwhile q.pop() > 1\n  if q.pop() == 3\n    print(\"three\")\n  endif\nendwhile\n";
    let mut store = MemoryStore::new();
    let run = run(source, &mut registry(&[], &["pop"]), &mut store);

    let report = run.result.unwrap();
    assert_eq!(report.summary.modifier_calls, 2);
    assert_eq!(report.summary.skipped_modifier_calls, 0);
    assert_eq!(run.output, "three\n");

    let ints = |items: &[i64]| RecordValue::List(items.iter().map(|&i| RecordValue::Int(i)).collect());
    let seen: Vec<(Option<u32>, RecordValue)> = run
        .log
        .iter()
        .map(|e| (e.record.line, e.record.value.clone()))
        .collect();
    assert_eq!(
        seen,
        vec![
            (Some(2), ints(&[0, 3, 5, 2])),
            (Some(3), ints(&[0, 3, 5])),
            (Some(2), ints(&[0, 3])),
            (Some(3), ints(&[0])),
            (Some(2), ints(&[])),
        ]
    );
    assert!(run.log.iter().all(|e| e.record.binding == "q"));
}

#[test]
fn test_for_iterable_call_records_once() {
    let source = "src = [1, 2]\nfor v in src.copy()\n  print(v)\nendfor\nempty = []\nfor w in empty.copy()\nendfor\n";
    let mut store = MemoryStore::new();
    let run = run(source, &mut registry(&[], &["copy"]), &mut store);

    assert!(run.result.is_ok());
    assert_eq!(run.output, "1\n2\n");
    assert_eq!(
        bindings(&run.log),
        vec![("src".to_string(), Some(2)), ("empty".to_string(), Some(6))]
    );
}

#[test]
fn test_no_selectors_means_no_records_and_same_output() {
    let source = "x = [3, 1, 2]\nx.sort()\nprint(x, len(log))\n";
    let mut plain_store = MemoryStore::new();
    let plain = run(source, &mut SelectorRegistry::new(), &mut plain_store);
    let report = plain.result.unwrap();
    assert!(plain.log.is_empty());
    assert_eq!(plain.output, "[1, 2, 3] 0\n");
    assert_eq!(report.summary.hooks_inserted(), 0);
    assert_eq!(report.program.to_source(), "x = [3, 1, 2]\nx.sort()\nprint(x, len(log))\n");

    // Instrumentation adds records but leaves program output alone
    let mut store = MemoryStore::new();
    let traced = run(source, &mut registry(&[(1, 2)], &["sort"]), &mut store);
    assert!(traced.result.is_ok());
    assert_eq!(traced.log.len(), 2);
    assert_eq!(traced.output, "[1, 2, 3] 2\n");
}

#[test]
fn test_self_containing_list_is_logged_and_printed() {
    let source = "a = [1]\na.append(a)\nprint(a, a == a.copy())\n";
    let mut store = FlakyStore::default();
    let run = run(source, &mut registry(&[], &["append"]), &mut store);

    assert!(run.result.is_ok());
    assert_eq!(run.output, "[1, [...]] true\n");
    assert_eq!(
        run.log.entries()[0].record.value,
        RecordValue::List(vec![
            RecordValue::Int(1),
            RecordValue::Opaque("[...]".to_string())
        ])
    );
    assert_eq!(store.closes, 1);
}

#[test]
fn test_every_save_failing_still_runs_to_completion() {
    let source = "x = 1\ny = 2\nprint(x + y)\n";
    let mut store = FlakyStore::always_failing();
    let run = run(source, &mut registry(&[(1, 3)], &[]), &mut store);

    assert!(run.result.is_ok());
    assert_eq!(run.output, "3\n");
    assert_eq!(run.log.len(), 2);
    assert_eq!(run.log.saved_count(), 0);
    assert!(run
        .log
        .iter()
        .all(|e| matches!(e.error(), Some(PersistenceError::Rejected { .. }))));
    assert!(store.saved.is_empty());
}

#[test]
fn test_second_of_three_saves_fails() {
    let source = "a = 1\nb = 2\nc = 3\n";
    let mut store = FlakyStore::failing_on(&[2]);
    let run = run(source, &mut registry(&[(1, 4)], &[]), &mut store);

    assert!(run.result.is_ok());
    let saved: Vec<bool> = run.log.iter().map(|e| e.saved()).collect();
    assert_eq!(saved, vec![true, false, true]);
    assert_eq!(
        store
            .saved
            .iter()
            .map(|r| r.binding.as_str())
            .collect::<Vec<_>>(),
        vec!["a", "c"]
    );
    assert_eq!(store.opens, 1);
    assert_eq!(store.closes, 1);
}

#[test]
fn test_saved_records_equal_log_records() {
    let source = "m = {\"k\": [1.5, none]}\nm[\"j\"] = true\nn = m\n";
    let mut store = MemoryStore::new();
    let run = run(source, &mut registry(&[(1, 4)], &[]), &mut store);

    assert!(run.result.is_ok());
    let logged: Vec<&LogRecord> = run.log.iter().map(|e| &e.record).collect();
    let stored: Vec<&LogRecord> = store.records().iter().collect();
    assert_eq!(logged, stored);
}

#[test]
fn test_runtime_error_keeps_earlier_records_and_releases_store() {
    let source = "x = 1\ny = x / 0\nz = 3\n";
    let mut store = FlakyStore::default();
    let run = run(source, &mut registry(&[(1, 4)], &[]), &mut store);

    match run.result {
        Err(ProbeError::Runtime(err)) => {
            assert_eq!(err.line, Some(2));
            assert_eq!(err.unit, "script.probe");
        }
        other => panic!("expected runtime error, got {other:?}"),
    }
    assert_eq!(bindings(&run.log), vec![("x".to_string(), Some(1))]);
    assert_eq!(store.opens, 1);
    assert_eq!(store.closes, 1);
}

#[test]
fn test_registry_frozen_after_run() {
    let mut registry = registry(&[(1, 2)], &[]);
    let mut store = MemoryStore::new();
    let _ = run("x = 1", &mut registry, &mut store);
    assert!(registry.is_frozen());
    assert!(registry.add_modifier_names(["append"]).is_err());
}

#[test]
fn test_syntax_error_runs_nothing() {
    let mut store = MemoryStore::new();
    let run = run("x = = 1", &mut registry(&[(1, 2)], &[]), &mut store);
    assert!(matches!(run.result, Err(ProbeError::Parse(_))));
    assert_eq!(store.open_count(), 0);
}

#[test]
fn test_compile_error_runs_nothing() {
    let mut store = MemoryStore::new();
    let run = run("break", &mut SelectorRegistry::new(), &mut store);
    assert!(matches!(run.result, Err(ProbeError::Compile(_))));
    assert_eq!(store.open_count(), 0);
}
