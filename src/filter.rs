// View filters and sort orders for the visible task sequence

use crate::models::Task;
use chrono::{DateTime, Utc};
use icu_collator::options::CollatorOptions;
use icu_collator::{Collator, CollatorBorrowed};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Predicate narrowing which tasks are visible
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    #[default]
    All,
    Today,
    MyDay,
    Important,
    Planned,
}

impl Filter {
    /// Whether `task` passes this filter. `now` anchors the `Today` check to
    /// its UTC calendar day, the same day boundary the stored timestamps use.
    pub fn matches(self, task: &Task, now: DateTime<Utc>) -> bool {
        match self {
            Filter::All => true,
            Filter::Today => task.created_at.date_naive() == now.date_naive(),
            Filter::MyDay => task.my_day,
            Filter::Important => task.priority.is_important(),
            Filter::Planned => task.due_date.is_some(),
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::All => write!(f, "all"),
            Filter::Today => write!(f, "today"),
            Filter::MyDay => write!(f, "my-day"),
            Filter::Important => write!(f, "important"),
            Filter::Planned => write!(f, "planned"),
        }
    }
}

/// Ordering of the visible task sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum SortOption {
    /// Newest first
    #[default]
    CreatedAt,
    /// Soonest first, undated last
    DueDate,
    /// High, medium, low, none
    Priority,
    Alphabetical,
}

impl SortOption {
    pub fn compare(self, a: &Task, b: &Task) -> Ordering {
        match self {
            SortOption::CreatedAt => b.created_at.cmp(&a.created_at),
            SortOption::DueDate => match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            SortOption::Priority => a.priority.rank().cmp(&b.priority.rank()),
            SortOption::Alphabetical => compare_text(&a.text, &b.text),
        }
    }

    /// Stable sort, so ties keep stored order
    pub fn sort(self, tasks: &mut [Task]) {
        tasks.sort_by(|a, b| self.compare(a, b));
    }
}

impl std::fmt::Display for SortOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortOption::CreatedAt => write!(f, "created-at"),
            SortOption::DueDate => write!(f, "due-date"),
            SortOption::Priority => write!(f, "priority"),
            SortOption::Alphabetical => write!(f, "alphabetical"),
        }
    }
}

thread_local! {
    // Root collation from compiled data; `None` only if that data is missing
    static COLLATOR: Option<CollatorBorrowed<'static>> =
        Collator::try_new(Default::default(), CollatorOptions::default()).ok();
}

// Unicode collation, then raw text to keep the order total
fn compare_text(a: &str, b: &str) -> Ordering {
    COLLATOR
        .with(|collator| match collator {
            Some(collator) => collator.compare(a, b),
            None => a.to_lowercase().cmp(&b.to_lowercase()),
        })
        .then_with(|| a.cmp(b))
}

/// Case-insensitive substring match used by the search box
pub fn matches_search(task: &Task, term: &str) -> bool {
    term.is_empty() || task.text.to_lowercase().contains(&term.to_lowercase())
}
