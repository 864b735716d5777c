//! The background wake-phrase loop.
//!
//! Each iteration makes one short, non-blocking attempt on the microphone.
//! The loop never holds the lease while recognizing, never competes with a
//! cycle in flight, and sleeps through the cooldown after a hit. Device and
//! service failures back off and retry; nothing here ends the loop except a
//! stop request.

use crate::audio::{AcquireOutcome, LeaseRole, ListenOutcome};
use crate::config::WakewordConfig;
use crate::listening::machine::ListeningStateMachine;
use crate::runtime::RuntimeEvent;
use crate::similarity;
use crate::stt::RecognitionOutcome;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub(crate) struct BackgroundWorker {
    machine: ListeningStateMachine,
    stop_rx: Receiver<()>,
    done_tx: Sender<()>,
    last_wake: Option<Instant>,
}

impl BackgroundWorker {
    pub(crate) fn new(
        machine: ListeningStateMachine,
        stop_rx: Receiver<()>,
        done_tx: Sender<()>,
    ) -> Self {
        Self {
            machine,
            stop_rx,
            done_tx,
            last_wake: None,
        }
    }

    pub(crate) fn run(mut self) {
        info!("background listener running");
        while self.machine.is_background_running() {
            let wait = self.attempt();
            if !self.pause(wait) {
                break;
            }
        }
        info!("background listener exiting");
        let _ = self.done_tx.send(());
    }

    /// One wake attempt. Returns how long to wait before the next one.
    fn attempt(&mut self) -> Duration {
        let parts = self.machine.parts();
        let (wake, listening) = {
            let config = parts.settings.read();
            (config.wakeword.clone(), config.listening.clone())
        };
        let idle = Duration::from_millis(listening.idle_poll_ms);

        if !wake.enabled || self.machine.is_busy() || self.cooling_down(&wake) {
            return idle;
        }

        let mut lease = match parts.arbiter.acquire(LeaseRole::Background, false) {
            Ok(AcquireOutcome::Granted(lease)) => lease,
            Ok(AcquireOutcome::Busy) => return idle,
            Err(e) => {
                warn!("background listener cannot open microphone: {e}");
                return Duration::from_millis(listening.device_retry_ms);
            }
        };

        let segment = match lease.listen(listening.background_window()) {
            Ok(ListenOutcome::Speech(segment)) => segment,
            Ok(ListenOutcome::Timeout) => return Duration::ZERO,
            Err(e) => {
                warn!("background capture failed: {e}");
                return Duration::from_millis(listening.device_retry_ms);
            }
        };
        drop(lease);

        match parts.recognizer.recognize(&segment) {
            RecognitionOutcome::Text(heard) => {
                self.check_wake(&heard, &wake);
                Duration::ZERO
            }
            RecognitionOutcome::ServiceError(e) => {
                debug!("wake recognition unavailable: {e}");
                Duration::from_millis(listening.service_retry_ms)
            }
            RecognitionOutcome::Unintelligible | RecognitionOutcome::Timeout => Duration::ZERO,
        }
    }

    fn check_wake(&mut self, heard: &str, wake: &WakewordConfig) {
        let phrase = wake.phrase.trim().to_lowercase();
        if phrase.is_empty() {
            return;
        }
        let score = similarity::best_score(&heard.to_lowercase(), &phrase);
        if score < wake.threshold {
            debug!(score, "not the wake phrase: \"{heard}\"");
            return;
        }

        info!(score, "wake phrase detected: \"{heard}\"");
        self.last_wake = Some(Instant::now());
        self.machine
            .parts()
            .events
            .publish(RuntimeEvent::WakeWordDetected {
                heard: heard.to_owned(),
                score,
            });
        if !self.machine.is_background_running() {
            return;
        }
        match self.machine.activate() {
            Ok(true) => {}
            Ok(false) => debug!("wake hit ignored, a cycle is already running"),
            Err(e) => error!("cannot start capture after wake: {e}"),
        }
    }

    fn cooling_down(&self, wake: &WakewordConfig) -> bool {
        self.last_wake
            .is_some_and(|at| at.elapsed() < wake.cooldown())
    }

    /// Sleep for `wait` unless a stop is requested. Returns `false` on stop.
    fn pause(&self, wait: Duration) -> bool {
        if wait.is_zero() {
            return matches!(self.stop_rx.try_recv(), Err(TryRecvError::Empty));
        }
        matches!(
            self.stop_rx.recv_timeout(wait),
            Err(RecvTimeoutError::Timeout)
        )
    }
}
