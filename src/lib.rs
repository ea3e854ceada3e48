// Tasklist - task store with debounced persistence and a heuristic task importer

pub mod config;
pub mod error;
pub mod extractor;
pub mod filter;
pub mod import;
pub mod jsonl;
pub mod models;
pub mod persist;
pub mod providers;
pub mod record;
pub mod sqlite;
pub mod storage;
pub mod store;

// Re-export main types for convenience
pub use error::{StorageError, StoreError};
pub use extractor::extract_tasks;
pub use filter::{Filter, SortOption};
pub use import::{ImportOutcome, import_text};
pub use models::{DEFAULT_LIST_ID, NewTask, Priority, SourceType, Step, Task, TaskUpdate};
pub use persist::PersistStatus;
pub use record::{TaskRecord, migrate};
pub use storage::{MemoryStorage, TaskStorage};
pub use store::{SubscriptionId, TaskStore};
