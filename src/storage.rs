// Durable storage contract for the task collection

use crate::error::StorageError;
use crate::models::Task;
use crate::record::TaskRecord;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Backend that holds the full, ordered task collection.
///
/// Implementations are called from the blocking thread pool, never from
/// the store's own thread, so plain synchronous I/O is fine here.
pub trait TaskStorage: Send + Sync {
    /// Read every stored record in order.
    ///
    /// Missing storage is an empty collection, not an error. Only storage
    /// that exists but cannot be read or understood fails.
    fn read_tasks(&self) -> Result<Vec<TaskRecord>, StorageError>;

    /// Replace the stored collection with `tasks`.
    fn write_tasks(&self, tasks: &[Task]) -> Result<(), StorageError>;
}

/// In-process storage, used for tests and ephemeral stores
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Mutex<Vec<TaskRecord>>,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<TaskRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Default::default()
        }
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current stored contents
    pub fn records(&self) -> Vec<TaskRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Make subsequent reads fail
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent writes fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl TaskStorage for MemoryStorage {
    fn read_tasks(&self) -> Result<Vec<TaskRecord>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory storage read disabled".to_string()));
        }
        let records = self
            .records
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage lock poisoned".to_string()))?;
        Ok(records.clone())
    }

    fn write_tasks(&self, tasks: &[Task]) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory storage write disabled".to_string()));
        }
        let mut records = self
            .records
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage lock poisoned".to_string()))?;
        *records = tasks.iter().cloned().map(TaskRecord::Current).collect();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
