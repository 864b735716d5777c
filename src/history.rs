//! Command log and unrecognized-command list.
//!
//! The log is a ring buffer, newest first. The unrecognized list feeds the
//! "teach this command" flow: it holds each unresolved phrase once, in the
//! order first heard, until the phrase is taught or dismissed.

use crate::config::HistoryConfig;
use crate::voice_command::{MatchTier, normalize_phrase};
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// One processed command.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub at: DateTime<Local>,
    pub command: String,
    pub response: String,
    /// `None` when the command was not resolved.
    pub tier: Option<MatchTier>,
}

struct Inner {
    log: VecDeque<HistoryEntry>,
    unrecognized: Vec<String>,
}

/// Thread-safe command history.
pub struct CommandHistory {
    inner: Mutex<Inner>,
    limit: usize,
    track_unrecognized: bool,
}

impl CommandHistory {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                log: VecDeque::new(),
                unrecognized: Vec::new(),
            }),
            limit: config.limit.max(1),
            track_unrecognized: config.save_unrecognized,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append to the log, evicting the oldest entry past the limit.
    pub fn record(&self, entry: HistoryEntry) {
        let mut inner = self.lock();
        inner.log.push_front(entry);
        inner.log.truncate(self.limit);
    }

    /// Remember an unresolved phrase (once).
    pub fn record_unrecognized(&self, text: &str) {
        if !self.track_unrecognized {
            return;
        }
        let phrase = normalize_phrase(text);
        if phrase.is_empty() {
            return;
        }
        let mut inner = self.lock();
        if !inner.unrecognized.contains(&phrase) {
            inner.unrecognized.push(phrase);
        }
    }

    /// Drop a phrase from the unrecognized list. Returns whether it was there.
    pub fn forget_unrecognized(&self, text: &str) -> bool {
        let phrase = normalize_phrase(text);
        let mut inner = self.lock();
        let before = inner.unrecognized.len();
        inner.unrecognized.retain(|p| *p != phrase);
        inner.unrecognized.len() != before
    }

    /// Log entries, newest first.
    #[must_use]
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.lock().log.iter().cloned().collect()
    }

    /// Unresolved phrases, oldest first.
    #[must_use]
    pub fn unrecognized(&self) -> Vec<String> {
        self.lock().unrecognized.clone()
    }

    /// Clear the log (the unrecognized list is kept).
    pub fn clear(&self) {
        self.lock().log.clear();
    }
}
