//! Runtime events emitted by the assistant for UI and observability.
//!
//! Events are small and cloneable so the listening threads can publish them
//! without blocking. Presentation layers subscribe through [`EventHub`].

use crate::listening::ListeningState;
use crate::voice_command::MatchTier;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::sync::Mutex;
use tracing::warn;

/// Events buffered per subscriber before new ones are dropped for it.
pub const EVENT_BUFFER: usize = 256;

/// Events that describe what the assistant is doing "right now".
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    /// The listening state machine moved to a new state.
    StateChanged {
        state: ListeningState,
        /// Human-readable status line ("Listening...", "Processing...").
        message: String,
    },
    /// The background loop heard the wake phrase.
    WakeWordDetected { heard: String, score: u8 },
    /// Text recognized from an active capture, or typed by the user.
    Transcription { text: String },
    /// A command was resolved and executed.
    CommandResolved {
        text: String,
        /// Table trigger or rule name.
        trigger: String,
        tier: MatchTier,
        confidence: f32,
    },
    /// Nothing matched.
    CommandUnrecognized { text: String },
    /// The response for the current cycle.
    Response { text: String },
    /// A reminder became due.
    ReminderDue { id: u64, description: String },
    /// A non-fatal error worth surfacing.
    Error { message: String },
}

/// Fan-out of [`RuntimeEvent`]s to any number of subscribers.
///
/// Publishing never blocks. Each subscriber gets a channel of
/// [`EVENT_BUFFER`] events; while it is full, new events are dropped for that
/// subscriber only. Subscribers whose receiver was dropped are pruned on the
/// next publish.
#[derive(Default)]
pub struct EventHub {
    subscribers: Mutex<Vec<Sender<RuntimeEvent>>>,
}

impl EventHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Receiver<RuntimeEvent> {
        let (tx, rx) = bounded(EVENT_BUFFER);
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber.
    pub fn publish(&self, event: RuntimeEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                warn!(?dropped, "event subscriber is not draining, event dropped");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    /// Number of live subscribers as of the last publish.
    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
