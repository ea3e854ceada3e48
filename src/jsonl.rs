// JSONL file storage: one task object per line

use crate::error::StorageError;
use crate::models::Task;
use crate::record::TaskRecord;
use crate::storage::TaskStorage;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Task collection kept in a single JSONL file.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// reader never sees a half-written collection. A `.lock` sidecar serializes
/// access between processes sharing the same file.
#[derive(Debug, Clone)]
pub struct JsonlStorage {
    path: PathBuf,
}

impl JsonlStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// `tasks.jsonl` inside `dir`
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(dir.as_ref().join("tasks.jsonl"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn open_lock(&self) -> Result<File, StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.sibling(".lock"))?;
        Ok(lock)
    }
}

impl TaskStorage for JsonlStorage {
    fn read_tasks(&self) -> Result<Vec<TaskRecord>, StorageError> {
        if !self.path.exists() {
            // File doesn't exist yet, nothing stored
            debug!(file = ?self.path, "No task file yet");
            return Ok(Vec::new());
        }

        let lock = self.open_lock()?;
        lock.lock_shared()?;

        let file = File::open(&self.path)?;
        let records = read_records(BufReader::new(file))?;

        info!(file = ?self.path, count = records.len(), "Loaded tasks from JSONL");
        Ok(records)
    }

    fn write_tasks(&self, tasks: &[Task]) -> Result<(), StorageError> {
        let lock = self.open_lock()?;
        lock.lock_exclusive()?;

        let tmp_path = self.sibling(".tmp");
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            for task in tasks {
                serde_json::to_writer(&mut writer, task)?;
                writer.write_all(b"\n")?;
            }
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        debug!(file = ?self.path, count = tasks.len(), "Wrote tasks to JSONL");
        // Lock is released when `lock` is dropped
        Ok(())
    }
}

/// Parse JSONL records, skipping blank lines.
///
/// Unlike a log, this file is the whole collection, so a bad line fails the
/// read rather than being skipped: skipping would let the next write erase it.
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<TaskRecord>, StorageError> {
    let mut records = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let value: serde_json::Value = serde_json::from_str(&line).map_err(|e| StorageError::Corrupt {
            line: line_num + 1,
            reason: e.to_string(),
        })?;
        let record = TaskRecord::from_value(value).map_err(|reason| StorageError::Corrupt {
            line: line_num + 1,
            reason,
        })?;
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DEFAULT_LIST_ID, Priority, Step};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn sample(id: &str, text: &str) -> Task {
        let created = Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap();
        Task::new(id.to_string(), text.to_string(), created, DEFAULT_LIST_ID.to_string())
    }

    #[test]
    fn test_read_nonexistent_file() {
        let temp = TempDir::new().unwrap();
        let storage = JsonlStorage::in_dir(temp.path().join("missing"));
        assert!(storage.read_tasks().unwrap().is_empty());
    }

    #[test]
    fn test_write_then_read_keeps_order_and_fields() {
        let temp = TempDir::new().unwrap();
        let storage = JsonlStorage::in_dir(temp.path());

        let mut first = sample("t-1", "Buy milk");
        first.priority = Priority::High;
        first.tags = vec!["errand".to_string()];
        first.steps = vec![Step {
            id: "s-1".to_string(),
            text: "Check fridge".to_string(),
            completed: true,
        }];
        let second = sample("t-2", "Call mom");

        storage.write_tasks(&[first.clone(), second.clone()]).unwrap();
        let records = storage.read_tasks().unwrap();
        assert_eq!(records, vec![TaskRecord::Current(first), TaskRecord::Current(second)]);
    }

    #[test]
    fn test_write_overwrites() {
        let temp = TempDir::new().unwrap();
        let storage = JsonlStorage::in_dir(temp.path());

        storage.write_tasks(&[sample("a", "A"), sample("b", "B")]).unwrap();
        storage.write_tasks(&[sample("c", "C")]).unwrap();

        let content = fs::read_to_string(storage.path()).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("\"id\":\"c\""));
        assert!(!temp.path().join("tasks.jsonl.tmp").exists());
    }

    #[test]
    fn test_read_legacy_and_blank_lines() {
        let temp = TempDir::new().unwrap();
        let storage = JsonlStorage::in_dir(temp.path());
        fs::write(
            storage.path(),
            "{\"id\":\"old\",\"text\":\"Legacy\",\"completed\":false,\"createdAt\":\"2023-01-01T00:00:00.000Z\"}\n\n   \n",
        )
        .unwrap();

        let records = storage.read_tasks().unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_legacy());
    }

    #[test]
    fn test_read_malformed_line_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let storage = JsonlStorage::in_dir(temp.path());
        fs::write(storage.path(), "{\"id\":\"a\",\"text\":\"ok\"}\n{malformed json}\n").unwrap();

        match storage.read_tasks() {
            Err(StorageError::Corrupt { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected corrupt error, got {:?}", other),
        }
    }

    #[test]
    fn test_read_non_object_line_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let storage = JsonlStorage::in_dir(temp.path());
        fs::write(storage.path(), "[\"not\", \"a task\"]\n").unwrap();

        assert!(matches!(storage.read_tasks(), Err(StorageError::Corrupt { line: 1, .. })));
    }
}
