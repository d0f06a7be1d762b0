use super::{DbInterface, PersistenceError, RecordKey};
use crate::recorder::LogRecord;

/// In-process store, kept for `--memory` runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Vec<LogRecord>,
    open: bool,
    opens: usize,
    closes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn open_count(&self) -> usize {
        self.opens
    }

    pub fn close_count(&self) -> usize {
        self.closes
    }
}

impl DbInterface for MemoryStore {
    fn open(&mut self) -> Result<(), PersistenceError> {
        self.open = true;
        self.opens += 1;
        Ok(())
    }

    fn save(&mut self, record: &LogRecord) -> Result<RecordKey, PersistenceError> {
        if !self.open {
            return Err(PersistenceError::Closed);
        }
        let key = RecordKey(self.records.len() as u64);
        self.records.push(record.clone());
        Ok(key)
    }

    fn close(&mut self) -> Result<(), PersistenceError> {
        self.open = false;
        self.closes += 1;
        Ok(())
    }
}
