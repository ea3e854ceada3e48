// Import flow: pasted text -> extracted tasks -> store

use crate::extractor::extract_tasks;
use crate::models::{NewTask, SourceType};
use crate::store::TaskStore;
use tracing::info;

/// Terminal outcome of one import action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Nothing but whitespace was pasted
    EmptyInput,
    NoTasksFound,
    Imported(usize),
}

impl std::fmt::Display for ImportOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportOutcome::EmptyInput => write!(f, "Please paste some text first."),
            ImportOutcome::NoTasksFound => write!(f, "No tasks found in the text."),
            ImportOutcome::Imported(n) => write!(f, "Imported {} tasks!", n),
        }
    }
}

/// Extract tasks from `text` and add them to `store` as one batch
pub fn import_text(store: &mut TaskStore, text: &str) -> ImportOutcome {
    if text.trim().is_empty() {
        return ImportOutcome::EmptyInput;
    }

    let candidates = extract_tasks(text);
    if candidates.is_empty() {
        return ImportOutcome::NoTasksFound;
    }

    let batch = candidates
        .into_iter()
        .map(|candidate| NewTask::new(candidate).with_source(SourceType::Text, None));
    let added = store.add_tasks(batch).len();
    info!(count = added, "Imported tasks from text");
    ImportOutcome::Imported(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::sync::Arc;

    async fn store() -> TaskStore {
        let mut store = TaskStore::new(Arc::new(MemoryStorage::new()));
        store.load().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_import_adds_batch_in_order() {
        let mut store = store().await;
        store.add_task("already here");

        let outcome = import_text(&mut store, "Plan:\n1. Book flights\n2. Reserve hotel\nCheers");
        assert_eq!(outcome, ImportOutcome::Imported(2));
        assert_eq!(outcome.to_string(), "Imported 2 tasks!");

        let texts: Vec<&str> = store.tasks().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Book flights", "Reserve hotel", "already here"]);
        assert_eq!(store.tasks()[0].source_type, Some(SourceType::Text));
    }

    #[tokio::test]
    async fn test_import_no_tasks_found() {
        let mut store = store().await;
        let outcome = import_text(&mut store, "Just chatting, nothing to do here.");
        assert_eq!(outcome, ImportOutcome::NoTasksFound);
        assert!(store.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_import_empty_input() {
        let mut store = store().await;
        assert_eq!(import_text(&mut store, "  \n "), ImportOutcome::EmptyInput);
        assert_eq!(
            ImportOutcome::EmptyInput.to_string(),
            "Please paste some text first."
        );
    }
}
