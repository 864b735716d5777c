//! One-shot reminder scheduler.
//!
//! Reminders are kept in memory only: each has its own timer task on the
//! tokio runtime, and a reminder that is cancelled before its timer elapses
//! never reaches the callback.

pub mod runner;
pub mod tasks;

pub use runner::{ReminderAnnouncer, ReminderCallback, ReminderScheduler};
pub use tasks::ScheduledTask;
