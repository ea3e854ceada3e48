// Clock and id capabilities injected into the store

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Source of unique identifiers for tasks and steps
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(at) }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Time-ordered UUIDv7 ids
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        Uuid::now_v7().to_string()
    }
}

/// Predictable ids of the form `{prefix}-{n}`, starting at 1
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn test_uuid_generator_unique() {
        let ids = UuidGenerator;
        let set: HashSet<String> = (0..100).map(|_| ids.next_id()).collect();
        assert_eq!(set.len(), 100);
    }

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialIds::new("task");
        assert_eq!(ids.next_id(), "task-1");
        assert_eq!(ids.next_id(), "task-2");
    }

    #[test]
    fn test_manual_clock() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(at);
        assert_eq!(clock.now(), at);
        clock.advance(Duration::days(1));
        assert_eq!(clock.now(), Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap());

        // Should be reasonable timestamp (after year 2020)
        assert!(SystemClock.now().timestamp() > 1_600_000_000);
    }
}
