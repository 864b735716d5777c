//! Reminder timers.
//!
//! Every scheduled reminder gets its own tokio task that sleeps until the due
//! time. On wake-up the task claims its entry from the active set under the
//! set's mutex and only then invokes the callback. Cancelling marks the entry
//! under the same mutex and wakes the timer task early through its
//! [`CancellationToken`]; the task then discards the entry. A timer that
//! elapses after the mark finds the flag set and delivers nothing.

use crate::config::SchedulerConfig;
use crate::error::{Result, SpeechError};
use crate::runtime::{EventHub, RuntimeEvent};
use crate::scheduler::tasks::ScheduledTask;
use crate::tts::Speaker;
use chrono::Local;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Callback invoked when a reminder becomes due.
///
/// Runs on the runtime's worker thread and must not block.
pub type ReminderCallback = Box<dyn Fn(&ScheduledTask) + Send + Sync>;

struct Entry {
    task: ScheduledTask,
    cancel: CancellationToken,
}

struct Inner {
    runtime: Handle,
    config: SchedulerConfig,
    next_id: AtomicU64,
    active: Mutex<HashMap<u64, Entry>>,
    callback: ReminderCallback,
    shutdown: CancellationToken,
}

impl Inner {
    fn active(&self) -> MutexGuard<'_, HashMap<u64, Entry>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fire(&self, id: u64) {
        let claimed = self.active().remove(&id);
        match claimed {
            Some(entry) if !entry.task.cancelled => {
                info!(id, description = %entry.task.description, "reminder due");
                (self.callback)(&entry.task);
            }
            Some(_) => debug!(id, "reminder timer elapsed after cancellation"),
            None => debug!(id, "reminder already gone"),
        }
    }

    /// Drop a cancelled entry once its timer task has stopped.
    fn discard(&self, id: u64) {
        let mut active = self.active();
        if active.get(&id).is_some_and(|e| e.task.cancelled) {
            active.remove(&id);
        }
    }
}

/// In-memory reminder scheduler. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ReminderScheduler {
    inner: Arc<Inner>,
}

impl ReminderScheduler {
    /// Create a scheduler whose timers run on `runtime`.
    pub fn new(runtime: Handle, config: SchedulerConfig, callback: ReminderCallback) -> Self {
        Self {
            inner: Arc::new(Inner {
                runtime,
                config,
                next_id: AtomicU64::new(1),
                active: Mutex::new(HashMap::new()),
                callback,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Schedule `description` to fire after `delay`. Returns the task id.
    ///
    /// # Errors
    ///
    /// Returns an error after [`ReminderScheduler::shutdown`].
    pub fn schedule(&self, description: &str, delay: Duration) -> Result<u64> {
        if self.inner.shutdown.is_cancelled() {
            return Err(SpeechError::Scheduler("scheduler is shut down".into()));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let task = ScheduledTask::new(id, description, Local::now(), delay);
        let cancel = self.inner.shutdown.child_token();
        info!(id, due_at = %task.due_at.format("%H:%M:%S"), "reminder scheduled: {description}");

        self.inner.active().insert(
            id,
            Entry {
                task,
                cancel: cancel.clone(),
            },
        );

        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(delay) => inner.fire(id),
                () = cancel.cancelled() => {
                    debug!(id, "reminder timer stopped");
                    inner.discard(id);
                }
            }
        });
        Ok(id)
    }

    /// Schedule with a delay in minutes, clamped to the configured range.
    /// Returns the task id and the minutes actually used.
    ///
    /// # Errors
    ///
    /// Returns an error after [`ReminderScheduler::shutdown`].
    pub fn schedule_minutes(&self, description: &str, minutes: u64) -> Result<(u64, u64)> {
        let minutes = self.inner.config.clamp_minutes(minutes);
        let id = self.schedule(description, Duration::from_secs(minutes * 60))?;
        Ok((id, minutes))
    }

    /// Cancel a pending reminder. Returns `false` if it already fired, was
    /// already cancelled, or never existed.
    pub fn cancel(&self, id: u64) -> bool {
        let mut active = self.inner.active();
        match active.get_mut(&id) {
            Some(entry) if !entry.task.cancelled => {
                entry.task.cancelled = true;
                entry.cancel.cancel();
                info!(id, "reminder cancelled");
                true
            }
            _ => false,
        }
    }

    /// Pending reminders, soonest first.
    #[must_use]
    pub fn active(&self) -> Vec<ScheduledTask> {
        let mut tasks: Vec<ScheduledTask> = self
            .inner
            .active()
            .values()
            .filter(|e| !e.task.cancelled)
            .map(|e| e.task.clone())
            .collect();
        tasks.sort_by(|a, b| a.due_at.cmp(&b.due_at).then(a.id.cmp(&b.id)));
        tasks
    }

    /// Configured default delay for reminders that name none.
    #[must_use]
    pub fn default_minutes(&self) -> u64 {
        self.inner.config.default_minutes
    }

    /// Stop every timer and drop all pending reminders.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let dropped = {
            let mut active = self.inner.active();
            let n = active.len();
            active.clear();
            n
        };
        info!(dropped, "reminder scheduler stopped");
    }
}

// ── ReminderAnnouncer ──────────────────────────────────────────────────────

/// Default reminder callback: publishes [`RuntimeEvent::ReminderDue`] and
/// speaks `Reminder: <description>` a few times on its own thread.
#[derive(Clone)]
pub struct ReminderAnnouncer {
    speaker: Speaker,
    events: Arc<EventHub>,
    repeats: u32,
    gap: Duration,
}

impl ReminderAnnouncer {
    pub fn new(speaker: Speaker, events: Arc<EventHub>, config: &SchedulerConfig) -> Self {
        Self {
            speaker,
            events,
            repeats: config.announce_repeats.max(1),
            gap: Duration::from_millis(config.announce_gap_ms),
        }
    }

    /// Announce `task`. Returns immediately; speech happens on a new thread.
    pub fn announce(&self, task: &ScheduledTask) {
        self.events.publish(RuntimeEvent::ReminderDue {
            id: task.id,
            description: task.description.clone(),
        });

        let speaker = self.speaker.clone();
        let repeats = self.repeats;
        let gap = self.gap;
        let message = format!("Reminder: {}", task.description);
        let spawned = std::thread::Builder::new()
            .name(format!("hark-reminder-{}", task.id))
            .spawn(move || {
                for i in 0..repeats {
                    if i > 0 {
                        std::thread::sleep(gap);
                    }
                    if let Err(e) = speaker.say_blocking(&message) {
                        error!("reminder announcement failed: {e}");
                        break;
                    }
                }
            });
        if let Err(e) = spawned {
            error!("cannot spawn reminder thread: {e}");
        }
    }

    /// Wrap as a scheduler callback.
    #[must_use]
    pub fn into_callback(self) -> ReminderCallback {
        Box::new(move |task| self.announce(task))
    }
}
