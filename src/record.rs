// Stored task records and forward migration of older shapes

use crate::models::{DEFAULT_LIST_ID, Priority, SourceType, Step, Task};
use crate::providers::{Clock, IdGenerator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A task as found in storage: either the current schema or an older,
/// partially populated one.
///
/// `Current` is tried first; it only matches when every non-optional field
/// is present, so anything written by this crate round-trips untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskRecord {
    Current(Task),
    Legacy(LegacyTask),
}

/// Historical task shape. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyTask {
    pub id: Option<String>,
    pub text: Option<String>,
    pub completed: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
    pub list_id: Option<String>,
    pub my_day: Option<bool>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    pub steps: Option<Vec<LegacyStep>>,
    pub due_date: Option<DateTime<Utc>>,
    pub reminder: Option<DateTime<Utc>>,
    pub attachments: Option<Vec<String>>,
    pub description: Option<String>,
    pub source_type: Option<SourceType>,
    pub source_data: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyStep {
    pub id: Option<String>,
    pub text: Option<String>,
    pub completed: Option<bool>,
}

impl From<Task> for TaskRecord {
    fn from(task: Task) -> Self {
        TaskRecord::Current(task)
    }
}

impl TaskRecord {
    /// Interpret one stored JSON value. Anything other than an object is rejected.
    pub fn from_value(value: serde_json::Value) -> Result<Self, String> {
        if !value.is_object() {
            return Err(format!("expected a task object, found {}", json_kind(&value)));
        }
        serde_json::from_value(value).map_err(|e| e.to_string())
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, TaskRecord::Legacy(_))
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Bring any stored record up to the current schema.
///
/// Missing fields get their defaults; a missing id or creation time is
/// generated from the supplied capabilities. Applying this to a task that
/// is already current returns it unchanged, so re-running is harmless.
pub fn migrate(record: TaskRecord, ids: &dyn IdGenerator, clock: &dyn Clock) -> Task {
    match record {
        TaskRecord::Current(task) => task,
        TaskRecord::Legacy(legacy) => {
            let mut tags: Vec<String> = Vec::new();
            for tag in legacy.tags.unwrap_or_default() {
                let tag = tag.trim().to_string();
                if !tag.is_empty() && !tags.contains(&tag) {
                    tags.push(tag);
                }
            }

            let steps = legacy
                .steps
                .unwrap_or_default()
                .into_iter()
                .map(|step| Step {
                    id: step.id.unwrap_or_else(|| ids.next_id()),
                    text: step.text.unwrap_or_default().trim().to_string(),
                    completed: step.completed.unwrap_or(false),
                })
                .collect();

            Task {
                id: legacy.id.unwrap_or_else(|| ids.next_id()),
                text: legacy.text.unwrap_or_default().trim().to_string(),
                completed: legacy.completed.unwrap_or(false),
                created_at: legacy.created_at.unwrap_or_else(|| clock.now()),
                list_id: legacy.list_id.unwrap_or_else(|| DEFAULT_LIST_ID.to_string()),
                my_day: legacy.my_day.unwrap_or(false),
                priority: legacy.priority.unwrap_or_default(),
                tags,
                steps,
                due_date: legacy.due_date,
                reminder: legacy.reminder,
                attachments: legacy.attachments.unwrap_or_default(),
                description: legacy.description,
                source_type: legacy.source_type,
                source_data: legacy.source_data,
            }
        }
    }
}
