use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::recorder::LogRecord;

/// Storage-related errors
#[derive(thiserror::Error, Debug)]
pub enum PersistenceError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Save attempted while the store is closed
    #[error("Persistence resource is not open")]
    Closed,

    /// The hook call carried no usable persistence resource
    #[error("No persistence resource was passed to the hook")]
    Unavailable,

    /// The store refused the record
    #[error("Record rejected: {message}")]
    Rejected { message: String },
}

pub mod memory_store;
pub mod sled_store;

pub use memory_store::MemoryStore;
pub use sled_store::SledStore;

/// Key a store assigns to a saved record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey(pub u64);

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A persistence backend for log records.
///
/// `open` is called once before the program runs and `close` once after,
/// whether the run succeeds or fails. `save` may fail per record; a failed
/// save does not stop the run.
pub trait DbInterface {
    fn open(&mut self) -> Result<(), PersistenceError>;

    fn save(&mut self, record: &LogRecord) -> Result<RecordKey, PersistenceError>;

    fn close(&mut self) -> Result<(), PersistenceError>;
}

/// An open persistence resource. Acquiring opens the backend; dropping the
/// guard closes it on every exit path, including unwinding.
pub struct DbResource<'db> {
    db: &'db mut dyn DbInterface,
}

impl<'db> DbResource<'db> {
    pub fn acquire(db: &'db mut dyn DbInterface) -> Result<Self, PersistenceError> {
        db.open()?;
        debug!("persistence resource acquired");
        Ok(Self { db })
    }

    pub fn save(&mut self, record: &LogRecord) -> Result<RecordKey, PersistenceError> {
        self.db.save(record)
    }
}

impl Drop for DbResource<'_> {
    fn drop(&mut self) {
        match self.db.close() {
            Ok(()) => debug!("persistence resource released"),
            Err(e) => warn!(error = %e, "failed to close persistence resource"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_closes_on_drop() {
        let mut store = MemoryStore::new();
        {
            let _resource = DbResource::acquire(&mut store).unwrap();
        }
        assert_eq!(store.open_count(), 1);
        assert_eq!(store.close_count(), 1);
        assert!(!store.is_open());
    }

    #[test]
    fn test_guard_closes_when_unwinding() {
        let mut store = MemoryStore::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _resource = DbResource::acquire(&mut store).unwrap();
            panic!("program blew up");
        }));
        assert!(result.is_err());
        assert_eq!(store.close_count(), 1);
    }
}
