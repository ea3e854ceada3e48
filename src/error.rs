//! Error types for storage backends and the task store.

/// Failure reading or writing the durable task collection.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Filesystem error.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data exists but cannot be understood.
    #[error("corrupt task storage at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },

    /// Task could not be encoded for writing.
    #[error("failed to serialize tasks: {0}")]
    Serialize(#[from] serde_json::Error),

    /// SQLite backend error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Backend cannot be reached at all (poisoned lock, worker gone).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Failure of a store operation that talks to storage.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `load()` was already called on this store.
    #[error("task store already loaded")]
    AlreadyLoaded,

    /// Underlying storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
