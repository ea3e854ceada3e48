// Data models for the task list

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// List every task belongs to unless moved elsewhere
pub const DEFAULT_LIST_ID: &str = "default";

/// A single actionable item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub list_id: String,
    pub my_day: bool,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub steps: Vec<Step>,
    pub due_date: Option<DateTime<Utc>>,
    pub reminder: Option<DateTime<Utc>>,
    pub attachments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<SourceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_data: Option<String>,
}

impl Task {
    /// Build a fresh task. `text` is expected to be trimmed and non-empty already.
    pub fn new(id: String, text: String, created_at: DateTime<Utc>, list_id: String) -> Self {
        Self {
            id,
            text,
            completed: false,
            created_at,
            list_id,
            my_day: false,
            priority: Priority::None,
            tags: Vec::new(),
            steps: Vec::new(),
            due_date: None,
            reminder: None,
            attachments: Vec::new(),
            description: None,
            source_type: None,
            source_data: None,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn step(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == step_id)
    }
}

/// Sub-checklist entry, owned by its parent task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl Priority {
    /// Sort rank: high first, none last
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
            Priority::None => 3,
        }
    }

    pub fn is_important(self) -> bool {
        matches!(self, Priority::High | Priority::Medium)
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::None => write!(f, "none"),
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Priority::None),
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// Where an imported task came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Text,
    Image,
    Pdf,
}

/// Input for creating a task
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTask {
    pub text: String,
    pub description: Option<String>,
    pub source_type: Option<SourceType>,
    pub source_data: Option<String>,
}

impl NewTask {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_source(mut self, source_type: SourceType, source_data: Option<String>) -> Self {
        self.source_type = Some(source_type);
        self.source_data = source_data;
        self
    }
}

impl From<&str> for NewTask {
    fn from(text: &str) -> Self {
        NewTask::new(text)
    }
}

impl From<String> for NewTask {
    fn from(text: String) -> Self {
        NewTask::new(text)
    }
}

/// Partial update applied by `TaskStore::update_task`.
///
/// Outer `None` leaves a field untouched. For optional fields the inner
/// `Option` is the new value, so `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub text: Option<String>,
    pub completed: Option<bool>,
    pub my_day: Option<bool>,
    pub priority: Option<Priority>,
    pub list_id: Option<String>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub reminder: Option<Option<DateTime<Utc>>>,
    pub description: Option<Option<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Task {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap();
        Task::new("t-1".to_string(), "Buy milk".to_string(), created, DEFAULT_LIST_ID.to_string())
    }

    #[test]
    fn test_new_task_defaults() {
        let task = sample();
        assert!(!task.completed);
        assert!(!task.my_day);
        assert_eq!(task.priority, Priority::None);
        assert!(task.tags.is_empty());
        assert!(task.steps.is_empty());
        assert!(task.attachments.is_empty());
        assert_eq!(task.list_id, "default");
    }

    #[test]
    fn test_task_serializes_camel_case() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("\"createdAt\":\"2024-01-01T09:30:00Z\""));
        assert!(json.contains("\"listId\":\"default\""));
        assert!(json.contains("\"myDay\":false"));
        assert!(json.contains("\"priority\":\"none\""));
        assert!(!json.contains("sourceType"));
    }

    #[test]
    fn test_priority_rank_orders_high_first() {
        let mut all = vec![Priority::None, Priority::Low, Priority::High, Priority::Medium];
        all.sort_by_key(|p| p.rank());
        assert_eq!(all, vec![Priority::High, Priority::Medium, Priority::Low, Priority::None]);
    }

    #[test]
    fn test_priority_from_str() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!(" low ".parse::<Priority>().unwrap(), Priority::Low);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_source_type_serialization() {
        assert_eq!(serde_json::to_string(&SourceType::Pdf).unwrap(), "\"pdf\"");
    }
}
