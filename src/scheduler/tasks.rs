//! Scheduled reminder definition.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A pending (or just fired) reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Monotonic identifier, unique for the scheduler's lifetime.
    pub id: u64,
    /// What to remind the user about.
    pub description: String,
    pub created_at: DateTime<Local>,
    pub due_at: DateTime<Local>,
    /// Set when the reminder was cancelled before firing.
    #[serde(default)]
    pub cancelled: bool,
}

impl ScheduledTask {
    /// Create a task due `delay` after `now`.
    #[must_use]
    pub fn new(id: u64, description: &str, now: DateTime<Local>, delay: Duration) -> Self {
        let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
        Self {
            id,
            description: description.to_owned(),
            created_at: now,
            due_at: now.checked_add_signed(delay).unwrap_or(now),
            cancelled: false,
        }
    }

    /// Time left until the task is due, zero when overdue.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Local>) -> Duration {
        (self.due_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether the task is due at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Local>) -> bool {
        now >= self.due_at
    }
}
