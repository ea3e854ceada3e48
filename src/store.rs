// Task store: the single source of truth for tasks and view state

use crate::error::{StorageError, StoreError};
use crate::filter::{Filter, SortOption, matches_search};
use crate::models::{DEFAULT_LIST_ID, NewTask, Priority, Step, Task, TaskUpdate};
use crate::persist::{DEFAULT_DEBOUNCE, PersistScheduler, PersistStatus};
use crate::providers::{Clock, IdGenerator, SystemClock, UuidGenerator};
use crate::record::migrate;
use crate::storage::TaskStorage;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Handle returned by `TaskStore::subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut()>;

/// In-memory task collection plus view state (list, filter, search, sort,
/// focus), with debounced persistence and change notification.
///
/// Mutations are synchronous and must run inside a tokio runtime, since each
/// one schedules a background write. Listeners are called synchronously after
/// every observable change; they cannot reach back into the store while it is
/// mutably borrowed, so re-query it after the call returns.
pub struct TaskStore {
    tasks: Vec<Task>,
    selected_list: String,
    filter: Filter,
    search_term: String,
    sort: SortOption,
    focused: Option<String>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
    loaded: bool,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    persist: PersistScheduler,
}

impl TaskStore {
    /// Create an empty store backed by `storage`. Call `load()` once before use.
    pub fn new(storage: Arc<dyn TaskStorage>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            tasks: Vec::new(),
            selected_list: DEFAULT_LIST_ID.to_string(),
            filter: Filter::default(),
            search_term: String::new(),
            sort: SortOption::default(),
            focused: None,
            listeners: Vec::new(),
            next_subscription: 0,
            loaded: false,
            persist: PersistScheduler::new(storage, Arc::clone(&clock), DEFAULT_DEBOUNCE),
            clock,
            ids: Arc::new(UuidGenerator),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        let storage = Arc::clone(self.persist.storage());
        let delay = self.persist.delay();
        self.persist = PersistScheduler::new(storage, Arc::clone(&clock), delay);
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Quiet period between the last mutation and the write
    pub fn with_debounce(mut self, delay: Duration) -> Self {
        self.persist.set_delay(delay);
        self
    }

    pub fn with_sort_option(mut self, sort: SortOption) -> Self {
        self.sort = sort;
        self
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Tasks in the selected list passing the filter and search, sorted
    pub fn visible_tasks(&self) -> Vec<Task> {
        let now = self.clock.now();
        let mut visible: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| t.list_id == self.selected_list)
            .filter(|t| self.filter.matches(t, now))
            .filter(|t| matches_search(t, &self.search_term))
            .cloned()
            .collect();
        self.sort.sort(&mut visible);
        visible
    }

    /// Every task, most recently created first
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn focused_task_id(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn sort_option(&self) -> SortOption {
        self.sort
    }

    pub fn selected_list(&self) -> &str {
        &self.selected_list
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Outcome of the latest persistence attempt
    pub fn persist_status(&self) -> PersistStatus {
        self.persist.status()
    }

    pub fn subscribe_persist(&self) -> watch::Receiver<PersistStatus> {
        self.persist.subscribe()
    }

    // ========================================================================
    // Loading and persistence
    // ========================================================================

    /// Replace in-memory tasks with the stored collection.
    ///
    /// Must be called once, at startup. A second call fails with
    /// `StoreError::AlreadyLoaded`. A storage failure leaves the store
    /// unloaded and untouched, so it is never mistaken for an empty list.
    /// Mutations are refused until a load succeeds.
    pub async fn load(&mut self) -> Result<usize, StoreError> {
        if self.loaded {
            return Err(StoreError::AlreadyLoaded);
        }
        self.persist.cancel();

        let storage = Arc::clone(self.persist.storage());
        let records = tokio::task::spawn_blocking(move || storage.read_tasks())
            .await
            .map_err(|e| StorageError::Unavailable(format!("read worker failed: {e}")))?
            .inspect_err(|e| error!(error = %e, "Failed to load tasks"))?;

        let mut seen = HashSet::new();
        let mut tasks = Vec::with_capacity(records.len());
        let mut migrated = 0usize;
        for record in records {
            if record.is_legacy() {
                migrated += 1;
            }
            let task = migrate(record, self.ids.as_ref(), self.clock.as_ref());
            if task.text.is_empty() {
                warn!(id = %task.id, "Dropping stored task with blank text");
                continue;
            }
            if !seen.insert(task.id.clone()) {
                warn!(id = %task.id, "Dropping duplicate stored task id");
                continue;
            }
            tasks.push(task);
        }

        info!(count = tasks.len(), migrated, "Loaded tasks");
        self.tasks = tasks;
        self.loaded = true;
        self.update_focus();
        self.notify();
        Ok(self.tasks.len())
    }

    /// Write the current collection now instead of waiting for the debounce
    pub async fn flush(&mut self) -> Result<(), StorageError> {
        if !self.loaded {
            return Err(StorageError::Unavailable("tasks have not been loaded".to_string()));
        }
        let snapshot = self.tasks.clone();
        self.persist.flush(snapshot).await
    }

    /// Wait for any scheduled write to complete
    pub async fn settle(&mut self) {
        self.persist.settle().await;
    }

    // ========================================================================
    // Task mutations
    // ========================================================================

    /// Add one task at the front. Blank text is ignored.
    ///
    /// Returns the new task's id.
    pub fn add_task(&mut self, new_task: impl Into<NewTask>) -> Option<String> {
        if !self.writable() {
            return None;
        }
        let task = self.build_task(new_task.into())?;
        let id = task.id.clone();
        debug!(id = %id, "Adding task");
        self.tasks.insert(0, task);
        self.commit();
        Some(id)
    }

    /// Add a batch as one block at the front, keeping the batch's order.
    ///
    /// Blank items are skipped. Returns the ids of the tasks added.
    pub fn add_tasks<I>(&mut self, batch: I) -> Vec<String>
    where
        I: IntoIterator,
        I::Item: Into<NewTask>,
    {
        if !self.writable() {
            return Vec::new();
        }
        let new_tasks: Vec<Task> = batch
            .into_iter()
            .filter_map(|item| self.build_task(item.into()))
            .collect();
        if new_tasks.is_empty() {
            return Vec::new();
        }

        let ids: Vec<String> = new_tasks.iter().map(|t| t.id.clone()).collect();
        debug!(count = ids.len(), "Adding task batch");
        let mut tasks = new_tasks;
        tasks.append(&mut self.tasks);
        self.tasks = tasks;
        self.commit();
        ids
    }

    pub fn delete_task(&mut self, id: &str) -> bool {
        if !self.writable() {
            return false;
        }
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            return false;
        }
        debug!(id, "Deleted task");
        self.commit();
        true
    }

    /// Replace the text. Blank text is ignored so a task never ends up empty.
    pub fn update_task_text(&mut self, id: &str, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        self.modify(id, |task| {
            if task.text == text {
                return false;
            }
            task.text = text.to_string();
            true
        })
    }

    /// Apply every field present in `update`
    pub fn update_task(&mut self, id: &str, update: TaskUpdate) -> bool {
        self.modify(id, |task| {
            let before = task.clone();
            if let Some(text) = update.text {
                let text = text.trim();
                if !text.is_empty() {
                    task.text = text.to_string();
                }
            }
            if let Some(completed) = update.completed {
                task.completed = completed;
            }
            if let Some(my_day) = update.my_day {
                task.my_day = my_day;
            }
            if let Some(priority) = update.priority {
                task.priority = priority;
            }
            if let Some(list_id) = update.list_id {
                let list_id = list_id.trim();
                if !list_id.is_empty() {
                    task.list_id = list_id.to_string();
                }
            }
            if let Some(due_date) = update.due_date {
                task.due_date = due_date;
            }
            if let Some(reminder) = update.reminder {
                task.reminder = reminder;
            }
            if let Some(description) = update.description {
                task.description = description;
            }
            *task != before
        })
    }

    pub fn toggle_completion(&mut self, id: &str) -> bool {
        self.modify(id, |task| {
            task.completed = !task.completed;
            true
        })
    }

    pub fn toggle_my_day(&mut self, id: &str) -> bool {
        self.modify(id, |task| {
            task.my_day = !task.my_day;
            true
        })
    }

    pub fn set_priority(&mut self, id: &str, priority: Priority) -> bool {
        self.modify(id, |task| {
            if task.priority == priority {
                return false;
            }
            task.priority = priority;
            true
        })
    }

    /// Add a tag unless already present
    pub fn add_tag(&mut self, id: &str, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() {
            return false;
        }
        self.modify(id, |task| {
            if task.has_tag(tag) {
                return false;
            }
            task.tags.push(tag.to_string());
            true
        })
    }

    /// Remove a tag if present
    pub fn remove_tag(&mut self, id: &str, tag: &str) -> bool {
        let tag = tag.trim();
        self.modify(id, |task| {
            let before = task.tags.len();
            task.tags.retain(|t| t != tag);
            task.tags.len() != before
        })
    }

    /// Append a step to the task's checklist. Returns the step id.
    pub fn add_step(&mut self, id: &str, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let step_id = self.ids.next_id();
        let added = self.modify(id, |task| {
            task.steps.push(Step {
                id: step_id.clone(),
                text: text.to_string(),
                completed: false,
            });
            true
        });
        added.then_some(step_id)
    }

    pub fn toggle_step(&mut self, id: &str, step_id: &str) -> bool {
        self.modify(id, |task| match task.steps.iter_mut().find(|s| s.id == step_id) {
            Some(step) => {
                step.completed = !step.completed;
                true
            }
            None => false,
        })
    }

    pub fn update_step_text(&mut self, id: &str, step_id: &str, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        self.modify(id, |task| match task.steps.iter_mut().find(|s| s.id == step_id) {
            Some(step) if step.text != text => {
                step.text = text.to_string();
                true
            }
            _ => false,
        })
    }

    pub fn delete_step(&mut self, id: &str, step_id: &str) -> bool {
        self.modify(id, |task| {
            let before = task.steps.len();
            task.steps.retain(|s| s.id != step_id);
            task.steps.len() != before
        })
    }

    pub fn set_due_date(&mut self, id: &str, due: Option<DateTime<Utc>>) -> bool {
        self.modify(id, |task| {
            if task.due_date == due {
                return false;
            }
            task.due_date = due;
            true
        })
    }

    pub fn set_reminder(&mut self, id: &str, reminder: Option<DateTime<Utc>>) -> bool {
        self.modify(id, |task| {
            if task.reminder == reminder {
                return false;
            }
            task.reminder = reminder;
            true
        })
    }

    pub fn move_to_list(&mut self, id: &str, list_id: &str) -> bool {
        let list_id = list_id.trim();
        if list_id.is_empty() {
            return false;
        }
        self.modify(id, |task| {
            if task.list_id == list_id {
                return false;
            }
            task.list_id = list_id.to_string();
            true
        })
    }

    pub fn add_attachment(&mut self, id: &str, reference: &str) -> bool {
        let reference = reference.trim();
        if reference.is_empty() {
            return false;
        }
        self.modify(id, |task| {
            task.attachments.push(reference.to_string());
            true
        })
    }

    pub fn remove_attachment(&mut self, id: &str, reference: &str) -> bool {
        self.modify(id, |task| {
            let before = task.attachments.len();
            task.attachments.retain(|a| a != reference);
            task.attachments.len() != before
        })
    }

    // ========================================================================
    // View state
    // ========================================================================

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
        self.update_focus();
        self.notify();
    }

    pub fn set_search_term(&mut self, term: &str) {
        self.search_term = term.to_string();
        self.update_focus();
        self.notify();
    }

    pub fn set_sort_option(&mut self, sort: SortOption) {
        self.sort = sort;
        self.notify();
    }

    pub fn set_selected_list(&mut self, list_id: &str) {
        self.selected_list = list_id.to_string();
        self.update_focus();
        self.notify();
    }

    /// Focus a visible task, or clear focus with `None`.
    ///
    /// An id that is not currently visible is ignored.
    pub fn set_focused_task_id(&mut self, id: Option<&str>) -> bool {
        match id {
            None => self.focused = None,
            Some(id) if self.visible_tasks().iter().any(|t| t.id == id) => self.focused = Some(id.to_string()),
            Some(_) => return false,
        }
        self.notify();
        true
    }

    /// Move focus one task down the visible sequence
    pub fn focus_next(&mut self) -> bool {
        self.step_focus(1)
    }

    /// Move focus one task up the visible sequence
    pub fn focus_previous(&mut self) -> bool {
        self.step_focus(-1)
    }

    fn step_focus(&mut self, delta: isize) -> bool {
        let visible = self.visible_tasks();
        let Some(first) = visible.first() else {
            return false;
        };

        let target = match self.focused.as_deref().and_then(|f| visible.iter().position(|t| t.id == f)) {
            None => first.id.clone(),
            Some(index) => match index.checked_add_signed(delta).and_then(|i| visible.get(i)) {
                Some(task) => task.id.clone(),
                None => return false,
            },
        };

        self.focused = Some(target);
        self.notify();
        true
    }

    /// Keep focus inside the visible set: fall back to the first visible task,
    /// or to nothing when the set is empty.
    pub fn update_focus(&mut self) {
        let visible = self.visible_tasks();
        let still_visible = self
            .focused
            .as_deref()
            .is_some_and(|f| visible.iter().any(|t| t.id == f));
        if !still_visible {
            self.focused = visible.first().map(|t| t.id.clone());
        }
    }

    // ========================================================================
    // Change notification
    // ========================================================================

    /// Register a listener called after every observable change
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut() + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    fn notify(&mut self) {
        for (_, listener) in self.listeners.iter_mut() {
            listener();
        }
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    fn build_task(&self, new_task: NewTask) -> Option<Task> {
        let text = new_task.text.trim();
        if text.is_empty() {
            return None;
        }
        let mut task = Task::new(
            self.ids.next_id(),
            text.to_string(),
            self.clock.now(),
            self.selected_list.clone(),
        );
        task.description = new_task.description;
        task.source_type = new_task.source_type;
        task.source_data = new_task.source_data;
        Some(task)
    }

    /// Apply `f` to the task with `id`. Commits only when `f` reports a change.
    fn modify<F>(&mut self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Task) -> bool,
    {
        if !self.writable() {
            return false;
        }
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(id, "Ignoring mutation of unknown task");
            return false;
        };
        if !f(task) {
            return false;
        }
        self.commit();
        true
    }

    // Writing before a successful load would overwrite stored tasks with a partial list
    fn writable(&self) -> bool {
        if !self.loaded {
            warn!("Ignoring mutation before tasks are loaded");
        }
        self.loaded
    }

    /// Schedule a write of the whole collection, repair focus, notify
    fn commit(&mut self) {
        self.persist.schedule(self.tasks.clone());
        self.update_focus();
        self.notify();
    }
}
