use std::path::{Path, PathBuf};

use tracing::{debug, info};
use uuid::Uuid;

use super::{DbInterface, PersistenceError, RecordKey};
use crate::recorder::LogRecord;

const RECORDS_TREE: &str = "records";

/// Record store backed by a sled database.
///
/// Every store instance tags what it saves with a fresh run id. Keys are the
/// run id followed by a big-endian sequence number, so one run's records
/// read back in the order they were saved.
pub struct SledStore {
    path: PathBuf,
    run_id: Uuid,
    sequence: u64,
    db: Option<sled::Db>,
    records: Option<sled::Tree>,
}

impl SledStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            run_id: Uuid::new_v4(),
            sequence: 0,
            db: None,
            records: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records saved under `run_id`, in save order. The store must be open.
    pub fn records(&self, run_id: Uuid) -> Result<Vec<LogRecord>, PersistenceError> {
        let tree = self.records.as_ref().ok_or(PersistenceError::Closed)?;
        tree.scan_prefix(run_id.as_bytes())
            .values()
            .map(|value| Ok(bincode::deserialize(&value?)?))
            .collect()
    }

    fn key(&self, sequence: u64) -> Vec<u8> {
        let mut key = Vec::with_capacity(24);
        key.extend_from_slice(self.run_id.as_bytes());
        key.extend_from_slice(&sequence.to_be_bytes());
        key
    }
}

impl DbInterface for SledStore {
    fn open(&mut self) -> Result<(), PersistenceError> {
        if self.db.is_some() {
            return Ok(());
        }
        let db = sled::open(&self.path)?;
        self.records = Some(db.open_tree(RECORDS_TREE)?);
        self.db = Some(db);
        info!(path = %self.path.display(), run = %self.run_id, "record store opened");
        Ok(())
    }

    fn save(&mut self, record: &LogRecord) -> Result<RecordKey, PersistenceError> {
        let tree = self.records.as_ref().ok_or(PersistenceError::Closed)?;
        let sequence = self.sequence;
        let value = bincode::serialize(record)?;
        tree.insert(self.key(sequence), value)?;
        self.sequence += 1;
        debug!(sequence, binding = %record.binding, "record saved");
        Ok(RecordKey(sequence))
    }

    fn close(&mut self) -> Result<(), PersistenceError> {
        self.records = None;
        if let Some(db) = self.db.take() {
            db.flush()?;
            debug!(path = %self.path.display(), "record store closed");
        }
        Ok(())
    }
}
