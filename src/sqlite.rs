// SQLite storage backend

use crate::error::StorageError;
use crate::models::Task;
use crate::record::TaskRecord;
use crate::storage::TaskStorage;
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Task collection stored as JSON rows in SQLite, ordered by position.
///
/// Each write replaces the whole table inside one transaction.
pub struct SqliteStorage {
    db: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open or create the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let db = Connection::open(path.as_ref())?;
        Self::from_connection(db)
    }

    /// `tasks.db` inside `dir`
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Result<Self, StorageError> {
        Self::open(dir.as_ref().join("tasks.db"))
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(db: Connection) -> Result<Self, StorageError> {
        create_schema(&db)?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
        self.db
            .lock()
            .map_err(|_| StorageError::Unavailable("sqlite connection lock poisoned".to_string()))
    }
}

/// Create database schema
fn create_schema(db: &Connection) -> Result<(), StorageError> {
    debug!("Creating database schema");

    db.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            position INTEGER PRIMARY KEY,
            id TEXT NOT NULL,
            data_json TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_id ON tasks(id);
        "#,
    )?;

    Ok(())
}

impl TaskStorage for SqliteStorage {
    fn read_tasks(&self) -> Result<Vec<TaskRecord>, StorageError> {
        let db = self.lock()?;
        let mut stmt = db.prepare("SELECT position, data_json FROM tasks ORDER BY position")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;

        let mut records = Vec::new();
        for row_result in rows {
            let (position, data_json) = row_result?;
            let line = usize::try_from(position).unwrap_or(0) + 1;
            let value: serde_json::Value = serde_json::from_str(&data_json).map_err(|e| StorageError::Corrupt {
                line,
                reason: e.to_string(),
            })?;
            let record = TaskRecord::from_value(value).map_err(|reason| StorageError::Corrupt { line, reason })?;
            records.push(record);
        }

        info!(count = records.len(), "Loaded tasks from SQLite");
        Ok(records)
    }

    fn write_tasks(&self, tasks: &[Task]) -> Result<(), StorageError> {
        let mut db = self.lock()?;
        let tx = db.transaction()?;

        tx.execute("DELETE FROM tasks", [])?;
        {
            let mut stmt = tx.prepare("INSERT INTO tasks (position, id, data_json) VALUES (?1, ?2, ?3)")?;
            for (position, task) in tasks.iter().enumerate() {
                let data_json = serde_json::to_string(task)?;
                stmt.execute(rusqlite::params![position as i64, &task.id, data_json])?;
            }
        }

        tx.commit()?;
        debug!(count = tasks.len(), "Wrote tasks to SQLite");
        Ok(())
    }
}
