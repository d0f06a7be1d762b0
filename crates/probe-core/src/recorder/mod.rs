//! Log aggregation for instrumented runs.
//!
//! Every hook invocation that carries a binding name produces one
//! [`LogRecord`], is offered to the persistence resource, and lands in the
//! caller's [`EventLog`] together with the outcome of that save. A failed save
//! is recorded, never raised: the program keeps running.

pub mod snapshot;

pub use snapshot::RecordValue;

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ast::Line;
use crate::evaluator::Value;
use crate::storage::{DbResource, PersistenceError, RecordKey};

/// One observation of a binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Type name of the value when it was observed
    pub value_type: String,
    /// Local wall-clock time of the observation
    pub timestamp: DateTime<Local>,
    pub line: Option<Line>,
    pub binding: String,
    pub value: RecordValue,
}

impl LogRecord {
    pub fn new(binding: impl Into<String>, line: Option<Line>, value: &Value) -> Self {
        Self {
            value_type: value.type_name().to_string(),
            timestamp: Local::now(),
            line,
            binding: binding.into(),
            value: RecordValue::snapshot(value),
        }
    }
}

/// `x = 1 <int> (line 3)`
impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {} <{}>", self.binding, self.value, self.value_type)?;
        if let Some(line) = self.line {
            write!(f, " (line {line})")?;
        }
        Ok(())
    }
}

/// A record and what happened when it was saved.
#[derive(Debug)]
pub struct LogEntry {
    pub record: LogRecord,
    pub outcome: Result<RecordKey, PersistenceError>,
}

impl LogEntry {
    pub fn saved(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn key(&self) -> Option<RecordKey> {
        self.outcome.as_ref().ok().copied()
    }

    pub fn error(&self) -> Option<&PersistenceError> {
        self.outcome.as_ref().err()
    }
}

/// Append-only log of a run's entries, in hook invocation order.
#[derive(Debug, Default)]
pub struct EventLog {
    entries: Vec<LogEntry>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn saved_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.saved()).count()
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }

    pub(crate) fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a LogEntry;
    type IntoIter = std::slice::Iter<'a, LogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// The hook's body. Without a binding name nothing is recorded; otherwise one
/// entry is appended whether or not the save succeeds. Returns whether an
/// entry was appended.
pub fn record(
    log: &mut EventLog,
    resource: Option<&mut DbResource<'_>>,
    value: &Value,
    binding: Option<&str>,
    line: Option<Line>,
) -> bool {
    let Some(binding) = binding else {
        debug!(?line, "hook called without a binding name, nothing recorded");
        return false;
    };

    let record = LogRecord::new(binding, line, value);
    let outcome = match resource {
        Some(resource) => resource.save(&record),
        None => Err(PersistenceError::Unavailable),
    };
    match &outcome {
        Ok(key) => debug!(binding, ?line, %key, "record saved"),
        Err(e) => warn!(binding, ?line, error = %e, "record not saved"),
    }
    log.push(LogEntry { record, outcome });
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DbInterface, MemoryStore};

    struct RejectingStore;

    impl DbInterface for RejectingStore {
        fn open(&mut self) -> Result<(), PersistenceError> {
            Ok(())
        }

        fn save(&mut self, _record: &LogRecord) -> Result<RecordKey, PersistenceError> {
            Err(PersistenceError::Rejected {
                message: "read only".into(),
            })
        }

        fn close(&mut self) -> Result<(), PersistenceError> {
            Ok(())
        }
    }

    #[test]
    fn test_nameless_call_is_a_no_op() {
        let mut log = EventLog::new();
        let mut store = MemoryStore::new();
        let mut resource = DbResource::acquire(&mut store).unwrap();
        assert!(!record(&mut log, Some(&mut resource), &Value::Int(1), None, Some(1)));
        drop(resource);
        assert!(log.is_empty());
        assert!(store.records().is_empty());
    }

    #[test]
    fn test_saved_entry_matches_store() {
        let mut log = EventLog::new();
        let mut store = MemoryStore::new();
        let mut resource = DbResource::acquire(&mut store).unwrap();
        assert!(record(&mut log, Some(&mut resource), &Value::Int(1), Some("x"), Some(3)));
        drop(resource);

        let entry = &log.entries()[0];
        assert!(entry.saved());
        assert_eq!(entry.key(), Some(RecordKey(0)));
        assert_eq!(entry.record.binding, "x");
        assert_eq!(entry.record.value_type, "int");
        assert_eq!(entry.record.line, Some(3));
        assert_eq!(store.records(), std::slice::from_ref(&entry.record));
    }

    #[test]
    fn test_failed_save_is_recorded() {
        let mut log = EventLog::new();
        let mut store = RejectingStore;
        let mut resource = DbResource::acquire(&mut store).unwrap();
        record(&mut log, Some(&mut resource), &Value::str("a"), Some("s"), None);
        record(&mut log, None, &Value::None, Some("t"), Some(2));

        assert_eq!(log.len(), 2);
        assert_eq!(log.saved_count(), 0);
        assert!(matches!(
            log.entries()[0].error(),
            Some(PersistenceError::Rejected { .. })
        ));
        assert!(matches!(
            log.entries()[1].error(),
            Some(PersistenceError::Unavailable)
        ));
    }

    #[test]
    fn test_display() {
        let record = LogRecord::new("items", Some(4), &Value::list(vec![Value::Int(5)]));
        assert_eq!(record.to_string(), "items = [5] <list> (line 4)");
        let record = LogRecord::new("s", None, &Value::str("hi"));
        assert_eq!(record.to_string(), "s = \"hi\" <str>");
    }
}
