//! Shared test doubles used across multiple test modules.
//!
//! Scripted stand-ins for the microphone, the recognizer and the speech
//! output so the concurrency paths can be exercised without hardware.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::audio::{CaptureDevice, CaptureSession, LeaseRole, ListenOutcome, SpeechSegment};
use crate::config::ListenWindow;
use crate::error::{Result, SpeechError};
use crate::stt::{RecognitionOutcome, SpeechRecognizer};
use crate::tts::SpeechSink;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// A short segment of silence, good enough to hand to a recognizer.
pub fn speech_segment() -> SpeechSegment {
    SpeechSegment {
        samples: vec![0.0; 1_600],
        sample_rate: 16_000,
        started_at: Instant::now(),
    }
}

// ── Capture ────────────────────────────────────────────────────────────────

/// One scripted result of [`CaptureSession::listen`].
#[derive(Debug, Clone)]
pub enum ListenStep {
    Speech,
    Timeout,
    Fail(String),
}

#[derive(Default)]
struct Scripts {
    background: VecDeque<ListenStep>,
    active: VecDeque<ListenStep>,
}

/// A capture device whose sessions replay per-role scripts.
///
/// An exhausted script behaves like silence: `listen` waits a few
/// milliseconds and reports a timeout.
#[derive(Default)]
pub struct ScriptedDevice {
    scripts: Arc<Mutex<Scripts>>,
    opened: AtomicUsize,
    fail_next: AtomicBool,
}

impl ScriptedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions opened so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Make the next `open` fail with a device error.
    pub fn fail_next_open(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Queue a listen result for sessions opened with `role`.
    pub fn push(&self, role: LeaseRole, step: ListenStep) {
        let mut scripts = self.scripts.lock().unwrap();
        match role {
            LeaseRole::Background => scripts.background.push_back(step),
            LeaseRole::Active => scripts.active.push_back(step),
        }
    }
}

impl CaptureDevice for ScriptedDevice {
    fn open(&self, role: LeaseRole) -> Result<Box<dyn CaptureSession>> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(SpeechError::DeviceUnavailable("scripted failure".into()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            role,
            scripts: Arc::clone(&self.scripts),
        }))
    }
}

struct ScriptedSession {
    role: LeaseRole,
    scripts: Arc<Mutex<Scripts>>,
}

impl CaptureSession for ScriptedSession {
    fn listen(&mut self, _window: ListenWindow) -> Result<ListenOutcome> {
        let step = {
            let mut scripts = self.scripts.lock().unwrap();
            match self.role {
                LeaseRole::Background => scripts.background.pop_front(),
                LeaseRole::Active => scripts.active.pop_front(),
            }
        };
        match step {
            Some(ListenStep::Speech) => Ok(ListenOutcome::Speech(speech_segment())),
            Some(ListenStep::Timeout) => Ok(ListenOutcome::Timeout),
            Some(ListenStep::Fail(e)) => Err(SpeechError::Audio(e)),
            None => {
                std::thread::sleep(Duration::from_millis(5));
                Ok(ListenOutcome::Timeout)
            }
        }
    }
}

// ── Recognition ────────────────────────────────────────────────────────────

/// A recognizer that replays outcomes in order, then reports a service error.
pub struct ScriptedRecognizer {
    name: String,
    outcomes: Mutex<VecDeque<RecognitionOutcome>>,
    calls: AtomicUsize,
}

impl ScriptedRecognizer {
    pub fn new(name: &str, outcomes: Vec<RecognitionOutcome>) -> Self {
        Self {
            name: name.to_owned(),
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue another outcome.
    pub fn push(&self, outcome: RecognitionOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    /// Number of `recognize` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn recognize(&self, _segment: &SpeechSegment) -> RecognitionOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| RecognitionOutcome::ServiceError("script exhausted".into()))
    }
}

// ── Speech output ──────────────────────────────────────────────────────────

/// A speech sink that records what it was asked to say.
#[derive(Default)]
pub struct RecordingSink {
    spoken: Mutex<Vec<String>>,
    changed: Condvar,
}

impl RecordingSink {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    /// Wait until at least `n` phrases were spoken.
    pub fn wait_for(&self, n: usize, timeout: Duration) -> bool {
        let guard = self.spoken.lock().unwrap();
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |spoken| spoken.len() < n)
            .unwrap();
        guard.len() >= n
    }
}

impl SpeechSink for RecordingSink {
    fn speak(&self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_owned());
        self.changed.notify_all();
        Ok(())
    }
}
