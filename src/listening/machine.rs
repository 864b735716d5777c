//! The listening state machine.
//!
//! Owns the single [`ListeningSession`] and runs the cycles that move it:
//!
//! - **voice cycle** (`activate`): acquire the active lease, capture,
//!   recognize, then process and respond. Runs on a short-lived thread.
//! - **typed cycle** (`submit_text`): process and respond on the caller's
//!   thread, without the microphone.
//! - **background loop** (`start_background`): a dedicated thread that
//!   listens for the wake phrase and starts voice cycles.
//!
//! Only one cycle runs at a time. Every transition is checked against
//! [`ListeningState::can_transition_to`] and published as
//! [`RuntimeEvent::StateChanged`].

use crate::audio::{
    AcquireOutcome, ExclusiveFlag, LeaseRole, ListenOutcome, MicrophoneArbiter, MicrophoneLease,
};
use crate::config::SettingsStore;
use crate::dispatch::CommandDispatcher;
use crate::error::{Result, SpeechError};
use crate::listening::background::BackgroundWorker;
use crate::listening::state::{ListeningSession, ListeningState};
use crate::runtime::{EventHub, RuntimeEvent};
use crate::stt::{RecognitionOutcome, SpeechRecognizer};
use crate::tts::Speaker;
use chrono::Local;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Said when an active capture heard nothing.
pub const NO_SPEECH_RESPONSE: &str = "I didn't hear anything. Please try again.";
/// Said when the recognizer could not make sense of the audio.
pub const UNINTELLIGIBLE_RESPONSE: &str =
    "Sorry, I didn't understand that. Could you please speak more clearly?";
/// Said when recognition failed outright.
pub const SERVICE_ERROR_RESPONSE: &str =
    "Sorry, I'm having trouble processing your request. Please try again.";

const MSG_WATCHING: &str = "Listening for wake word...";
const MSG_CAPTURING: &str = "Listening...";
const MSG_PROCESSING: &str = "Processing...";
const MSG_READY: &str = "Ready";

/// Everything the machine talks to.
pub struct MachineParts {
    pub arbiter: MicrophoneArbiter,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub dispatcher: Arc<CommandDispatcher>,
    pub speaker: Speaker,
    pub settings: Arc<SettingsStore>,
    pub events: Arc<EventHub>,
}

struct BackgroundHandle {
    /// Dropped to stop the worker.
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    thread: JoinHandle<()>,
}

struct Inner {
    parts: MachineParts,
    session: Mutex<ListeningSession>,
    cycle: ExclusiveFlag,
    background_running: AtomicBool,
    background: Mutex<Option<BackgroundHandle>>,
}

/// Releases the cycle slot when a cycle ends.
struct CycleGuard {
    inner: Arc<Inner>,
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.inner.cycle.try_stop();
    }
}

/// Coordinates the background loop, voice cycles and typed input.
/// Cheap to clone; clones drive the same session.
#[derive(Clone)]
pub struct ListeningStateMachine {
    inner: Arc<Inner>,
}

impl ListeningStateMachine {
    pub fn new(parts: MachineParts) -> Self {
        Self {
            inner: Arc::new(Inner {
                parts,
                session: Mutex::new(ListeningSession::new()),
                cycle: ExclusiveFlag::new(),
                background_running: AtomicBool::new(false),
                background: Mutex::new(None),
            }),
        }
    }

    pub(super) fn parts(&self) -> &MachineParts {
        &self.inner.parts
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ListeningState {
        self.inner.lock_session().state
    }

    /// Current session snapshot.
    #[must_use]
    pub fn session(&self) -> ListeningSession {
        *self.inner.lock_session()
    }

    /// Whether a voice or typed cycle is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.inner.cycle.is_busy()
    }

    #[must_use]
    pub fn is_background_running(&self) -> bool {
        self.inner.background_running.load(Ordering::SeqCst)
    }

    // ── Background loop ────────────────────────────────────────────────────

    /// Start the background wake loop. Returns `false` if it already runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn start_background(&self) -> Result<bool> {
        let mut slot = self.inner.lock_background();
        if slot.is_some() {
            return Ok(false);
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<()>(1);
        self.inner.background_running.store(true, Ordering::SeqCst);
        let worker = BackgroundWorker::new(self.clone(), stop_rx, done_tx);
        let thread = std::thread::Builder::new()
            .name("hark-background".into())
            .spawn(move || worker.run())
            .map_err(|e| {
                self.inner.background_running.store(false, Ordering::SeqCst);
                SpeechError::Listening(format!("cannot spawn background listener: {e}"))
            })?;
        *slot = Some(BackgroundHandle {
            stop_tx,
            done_rx,
            thread,
        });
        drop(slot);

        // A running cycle moves to BackgroundWatch itself when it ends.
        let mut session = self.inner.lock_session();
        if session.state == ListeningState::Idle {
            let _ = self
                .inner
                .set_state(&mut session, ListeningState::BackgroundWatch, MSG_WATCHING);
        }
        info!("background listening started");
        Ok(true)
    }

    /// Stop the background loop, waiting a bounded time for the thread.
    ///
    /// Returns `false` when the thread did not finish in time and was
    /// abandoned. It exits by itself after its current attempt.
    pub fn stop_background(&self) -> bool {
        let Some(handle) = self.inner.lock_background().take() else {
            return true;
        };
        self.inner.background_running.store(false, Ordering::SeqCst);
        let BackgroundHandle {
            stop_tx,
            done_rx,
            thread,
        } = handle;
        drop(stop_tx);

        let timeout = Duration::from_millis(
            self.inner
                .parts
                .settings
                .read()
                .listening
                .stop_join_timeout_ms,
        );
        let joined = match done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if thread.join().is_err() {
                    error!("background listener panicked");
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(?timeout, "background listener did not stop in time, abandoning it");
                false
            }
        };

        let mut session = self.inner.lock_session();
        if session.state == ListeningState::BackgroundWatch {
            let _ = self.inner.set_state(
                &mut session,
                ListeningState::Idle,
                "Background listening stopped",
            );
        }
        info!("background listening stopped");
        joined
    }

    /// Persist the background-listening toggle and start or stop the loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the setting cannot be saved or the loop cannot start.
    pub fn set_background_listening(&self, enabled: bool) -> Result<()> {
        self.inner.parts.settings.set_background_listening(enabled)?;
        if enabled {
            self.start_background()?;
        } else {
            self.stop_background();
        }
        Ok(())
    }

    // ── Cycles ─────────────────────────────────────────────────────────────

    /// Start a voice cycle on its own thread (wake hit or manual trigger).
    ///
    /// Returns `false` when another cycle is already running.
    ///
    /// # Errors
    ///
    /// Returns an error if the cycle thread cannot be spawned.
    pub fn activate(&self) -> Result<bool> {
        let Some(guard) = self.inner.claim_cycle() else {
            debug!("activation ignored, a cycle is already running");
            return Ok(false);
        };
        let inner = Arc::clone(&self.inner);
        std::thread::Builder::new()
            .name("hark-active-cycle".into())
            .spawn(move || {
                inner.voice_cycle();
                drop(guard);
            })
            .map_err(|e| SpeechError::Listening(format!("cannot spawn capture cycle: {e}")))?;
        Ok(true)
    }

    /// Process typed text as if it had been spoken. Blocks until the
    /// response has been delivered and returns it.
    ///
    /// # Errors
    ///
    /// Returns an error for blank input or while another cycle is running.
    pub fn submit_text(&self, text: &str) -> Result<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SpeechError::Listening("nothing to process".into()));
        }
        let Some(_guard) = self.inner.claim_cycle() else {
            return Err(SpeechError::Listening(
                "another command is still being handled".into(),
            ));
        };

        self.inner
            .transition(ListeningState::Processing, MSG_PROCESSING)?;
        let response = self.inner.process(text);
        self.inner.resume();
        Ok(response)
    }
}

impl Inner {
    fn lock_session(&self) -> MutexGuard<'_, ListeningSession> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_background(&self) -> MutexGuard<'_, Option<BackgroundHandle>> {
        self.background
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn claim_cycle(self: &Arc<Self>) -> Option<CycleGuard> {
        self.cycle.try_start().then(|| CycleGuard {
            inner: Arc::clone(self),
        })
    }

    fn set_state(
        &self,
        session: &mut ListeningSession,
        next: ListeningState,
        message: &str,
    ) -> Result<()> {
        let from = session.state;
        if !from.can_transition_to(next) {
            warn!(%from, to = %next, "rejected listening transition");
            return Err(SpeechError::Listening(format!(
                "cannot go from {from} to {next}"
            )));
        }
        debug!(%from, to = %next, "listening transition");
        session.state = next;
        session.started_at = Local::now();
        self.parts.events.publish(RuntimeEvent::StateChanged {
            state: next,
            message: message.to_owned(),
        });
        Ok(())
    }

    fn transition(&self, next: ListeningState, message: &str) -> Result<()> {
        let mut session = self.lock_session();
        self.set_state(&mut session, next, message)
    }

    /// Give the microphone back and leave `ActiveCapture` in one step.
    fn transition_releasing(
        &self,
        lease: MicrophoneLease,
        next: ListeningState,
        message: &str,
    ) -> Result<()> {
        let mut session = self.lock_session();
        drop(lease);
        self.set_state(&mut session, next, message)
    }

    /// End of a cycle: back to `Idle`, then `BackgroundWatch` if the loop runs.
    fn resume(&self) {
        let mut session = self.lock_session();
        if session.state != ListeningState::Idle
            && self
                .set_state(&mut session, ListeningState::Idle, MSG_READY)
                .is_err()
        {
            return;
        }
        if self.background_running.load(Ordering::SeqCst) {
            let _ = self.set_state(&mut session, ListeningState::BackgroundWatch, MSG_WATCHING);
        }
    }

    /// Processing → Responding for `text`. Returns the response.
    fn process(&self, text: &str) -> String {
        self.parts.events.publish(RuntimeEvent::Transcription {
            text: text.to_owned(),
        });
        let dispatched = self.parts.dispatcher.dispatch(text);
        if self
            .transition(ListeningState::Responding, &dispatched.response)
            .is_ok()
        {
            self.deliver(&dispatched.response);
        }
        dispatched.response
    }

    fn deliver(&self, response: &str) {
        self.parts.events.publish(RuntimeEvent::Response {
            text: response.to_owned(),
        });
        if let Err(e) = self.parts.speaker.say_blocking(response) {
            warn!("cannot speak response: {e}");
        }
    }

    fn report(&self, message: String) {
        self.parts.events.publish(RuntimeEvent::Error { message });
    }

    fn voice_cycle(&self) {
        let window = self.parts.settings.read().listening.active_window();

        let mut lease = match self.parts.arbiter.acquire(LeaseRole::Active, true) {
            Ok(AcquireOutcome::Granted(lease)) => lease,
            Ok(AcquireOutcome::Busy) => return,
            Err(e) => {
                warn!("active capture could not start: {e}");
                self.report(e.to_string());
                return;
            }
        };
        if self
            .transition(ListeningState::ActiveCapture, MSG_CAPTURING)
            .is_err()
        {
            return;
        }

        let segment = match lease.listen(window) {
            Ok(ListenOutcome::Speech(segment)) => segment,
            Ok(ListenOutcome::Timeout) => {
                info!("no speech before the capture timeout");
                self.timed_out(lease);
                return;
            }
            Err(e) => {
                warn!("active capture failed: {e}");
                self.report(e.to_string());
                let _ = self.transition_releasing(lease, ListeningState::Idle, "Microphone error");
                self.resume();
                return;
            }
        };

        match self.parts.recognizer.recognize(&segment) {
            RecognitionOutcome::Text(text) => {
                if self
                    .transition_releasing(lease, ListeningState::Processing, MSG_PROCESSING)
                    .is_ok()
                {
                    self.process(&text);
                }
                self.resume();
            }
            RecognitionOutcome::Timeout => self.timed_out(lease),
            RecognitionOutcome::Unintelligible => {
                let _ = self.transition_releasing(lease, ListeningState::Idle, MSG_READY);
                self.deliver(UNINTELLIGIBLE_RESPONSE);
                self.resume();
            }
            RecognitionOutcome::ServiceError(e) => {
                self.report(format!("speech recognition failed: {e}"));
                let _ = self.transition_releasing(lease, ListeningState::Idle, MSG_READY);
                self.deliver(SERVICE_ERROR_RESPONSE);
                self.resume();
            }
        }
    }

    fn timed_out(&self, lease: MicrophoneLease) {
        if self
            .transition_releasing(lease, ListeningState::Responding, NO_SPEECH_RESPONSE)
            .is_ok()
        {
            self.deliver(NO_SPEECH_RESPONSE);
        }
        self.resume();
    }
}
