//! Listening states and the allowed transitions between them.

use chrono::{DateTime, Local};
use std::fmt;

/// What the assistant is doing with the microphone right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListeningState {
    /// Nothing running.
    Idle,
    /// The background loop is waiting for the wake phrase.
    BackgroundWatch,
    /// A command is being captured. The active lease is held.
    ActiveCapture,
    /// Recognized or typed text is being resolved and executed.
    Processing,
    /// The response is being delivered.
    Responding,
}

impl ListeningState {
    /// Whether `self → next` is a legal edge.
    #[must_use]
    pub fn can_transition_to(self, next: ListeningState) -> bool {
        use ListeningState::*;
        matches!(
            (self, next),
            (Idle, BackgroundWatch)
                | (Idle, ActiveCapture)
                | (Idle, Processing)
                | (BackgroundWatch, ActiveCapture)
                | (BackgroundWatch, Processing)
                | (BackgroundWatch, Idle)
                | (ActiveCapture, Processing)
                | (ActiveCapture, Responding)
                | (ActiveCapture, Idle)
                | (Processing, Responding)
                | (Responding, Idle)
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::BackgroundWatch => "background_watch",
            Self::ActiveCapture => "active_capture",
            Self::Processing => "processing",
            Self::Responding => "responding",
        }
    }
}

impl fmt::Display for ListeningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The assistant's single listening session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListeningSession {
    pub state: ListeningState,
    /// When the current state was entered.
    pub started_at: DateTime<Local>,
}

impl ListeningSession {
    pub(crate) fn new() -> Self {
        Self {
            state: ListeningState::Idle,
            started_at: Local::now(),
        }
    }
}
