//! Mutual exclusion over the single microphone.
//!
//! The background wake loop and the active capture cycle both need the
//! microphone, and only one of them may hold it at a time. The arbiter keeps a
//! single holder slot behind a mutex; a [`MicrophoneLease`] represents the
//! right to listen and owns a capture session opened fresh for that lease.
//! Dropping the lease closes the session and wakes any blocked acquirer.
//!
//! There is no role priority: an active capture that arrives while the
//! background loop holds the microphone waits for the (short) background
//! attempt to finish.

use crate::audio::SpeechSegment;
use crate::config::ListenWindow;
use crate::error::{Result, SpeechError};
use chrono::{DateTime, Local};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Who wants the microphone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseRole {
    /// Short wake-phrase attempts.
    Background,
    /// A full command capture.
    Active,
}

/// Current holder of the microphone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseHolder {
    None,
    Background,
    Active,
}

impl From<LeaseRole> for LeaseHolder {
    fn from(role: LeaseRole) -> Self {
        match role {
            LeaseRole::Background => Self::Background,
            LeaseRole::Active => Self::Active,
        }
    }
}

/// Point-in-time view of the holder slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseSnapshot {
    pub holder: LeaseHolder,
    /// When the current holder acquired the microphone.
    pub acquired_at: Option<DateTime<Local>>,
}

/// Result of a single listen call.
#[derive(Debug, Clone)]
pub enum ListenOutcome {
    /// A complete utterance.
    Speech(SpeechSegment),
    /// Nobody started speaking within the window's timeout.
    Timeout,
}

/// An open microphone stream.
///
/// Sessions are not required to be `Send`: a lease is used on the thread that
/// acquired it.
pub trait CaptureSession {
    /// Wait for an utterance.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream fails while listening.
    fn listen(&mut self, window: ListenWindow) -> Result<ListenOutcome>;
}

/// Opens capture sessions on the physical device.
pub trait CaptureDevice: Send + Sync {
    /// Open a new session for `role`.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is missing, busy, or refuses to open.
    fn open(&self, role: LeaseRole) -> Result<Box<dyn CaptureSession>>;
}

/// Outcome of [`MicrophoneArbiter::acquire`].
pub enum AcquireOutcome {
    Granted(MicrophoneLease),
    /// Non-blocking acquire found the microphone held.
    Busy,
}

impl fmt::Debug for AcquireOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Granted(lease) => f.debug_tuple("Granted").field(&lease.role).finish(),
            Self::Busy => f.write_str("Busy"),
        }
    }
}

struct Slot {
    holder: LeaseHolder,
    acquired_at: Option<DateTime<Local>>,
}

struct Shared {
    slot: Mutex<Slot>,
    freed: Condvar,
    device: Arc<dyn CaptureDevice>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn release(&self) {
        let mut slot = self.lock();
        slot.holder = LeaseHolder::None;
        slot.acquired_at = None;
        drop(slot);
        self.freed.notify_all();
    }
}

/// Gate around the microphone. Cheap to clone; clones share the slot.
#[derive(Clone)]
pub struct MicrophoneArbiter {
    shared: Arc<Shared>,
}

impl MicrophoneArbiter {
    /// Create an arbiter for `device`.
    pub fn new(device: Arc<dyn CaptureDevice>) -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    holder: LeaseHolder::None,
                    acquired_at: None,
                }),
                freed: Condvar::new(),
                device,
            }),
        }
    }

    /// Acquire the microphone for `role`.
    ///
    /// With `blocking`, waits until the slot is free; otherwise returns
    /// [`AcquireOutcome::Busy`] immediately when it is held. Once the slot is
    /// claimed a fresh capture session is opened for the lease.
    ///
    /// # Errors
    ///
    /// Returns [`SpeechError::DeviceUnavailable`] when the session cannot be
    /// opened. The slot is released again before returning.
    pub fn acquire(&self, role: LeaseRole, blocking: bool) -> Result<AcquireOutcome> {
        let acquired_at = {
            let mut slot = self.shared.lock();
            while slot.holder != LeaseHolder::None {
                if !blocking {
                    return Ok(AcquireOutcome::Busy);
                }
                slot = self
                    .shared
                    .freed
                    .wait(slot)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }
            let now = Local::now();
            slot.holder = role.into();
            slot.acquired_at = Some(now);
            now
        };

        // Open outside the lock: a slow device must not stall snapshot readers.
        match self.shared.device.open(role) {
            Ok(session) => {
                debug!(?role, "microphone lease granted");
                Ok(AcquireOutcome::Granted(MicrophoneLease {
                    shared: Arc::clone(&self.shared),
                    role,
                    acquired_at,
                    session: Some(session),
                }))
            }
            Err(e) => {
                self.shared.release();
                warn!(?role, "cannot open microphone: {e}");
                Err(match e {
                    SpeechError::DeviceUnavailable(_) => e,
                    other => SpeechError::DeviceUnavailable(other.to_string()),
                })
            }
        }
    }

    /// Current holder.
    #[must_use]
    pub fn holder(&self) -> LeaseSnapshot {
        let slot = self.shared.lock();
        LeaseSnapshot {
            holder: slot.holder,
            acquired_at: slot.acquired_at,
        }
    }

    /// Whether anyone holds the microphone.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.holder().holder != LeaseHolder::None
    }
}

/// The right to use the microphone, with its open capture session.
///
/// Released on drop.
pub struct MicrophoneLease {
    shared: Arc<Shared>,
    role: LeaseRole,
    acquired_at: DateTime<Local>,
    session: Option<Box<dyn CaptureSession>>,
}

impl MicrophoneLease {
    /// Role this lease was granted for.
    #[must_use]
    pub fn role(&self) -> LeaseRole {
        self.role
    }

    /// When the lease was granted.
    #[must_use]
    pub fn acquired_at(&self) -> DateTime<Local> {
        self.acquired_at
    }

    /// Listen on the lease's session.
    ///
    /// # Errors
    ///
    /// Returns an error if the capture session fails.
    pub fn listen(&mut self, window: ListenWindow) -> Result<ListenOutcome> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| SpeechError::Audio("capture session already closed".into()))?;
        session.listen(window)
    }

    /// Release explicitly. Equivalent to dropping the lease.
    pub fn release(self) {}
}

impl Drop for MicrophoneLease {
    fn drop(&mut self) {
        // Close the stream before anyone else can open the device.
        drop(self.session.take());
        self.shared.release();
        debug!(role = ?self.role, "microphone lease released");
    }
}

// ── ExclusiveFlag ──────────────────────────────────────────────────────────

/// A compare-and-swap busy flag for single-instance activities such as
/// screen recording.
#[derive(Debug, Default)]
pub struct ExclusiveFlag {
    busy: AtomicBool,
}

impl ExclusiveFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark busy. Returns `false` if it already was.
    pub fn try_start(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Mark idle. Returns `false` if it already was.
    pub fn try_stop(&self) -> bool {
        self.busy
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::test_utils::ScriptedDevice;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn arbiter() -> (MicrophoneArbiter, Arc<ScriptedDevice>) {
        let device = Arc::new(ScriptedDevice::new());
        (MicrophoneArbiter::new(device.clone()), device)
    }

    fn granted(outcome: AcquireOutcome) -> MicrophoneLease {
        match outcome {
            AcquireOutcome::Granted(lease) => lease,
            AcquireOutcome::Busy => panic!("expected a lease"),
        }
    }

    #[test]
    fn non_blocking_acquire_reports_busy() {
        let (arbiter, _) = arbiter();
        let lease = granted(arbiter.acquire(LeaseRole::Active, false).unwrap());
        assert_eq!(arbiter.holder().holder, LeaseHolder::Active);
        assert!(arbiter.holder().acquired_at.is_some());

        assert!(matches!(
            arbiter.acquire(LeaseRole::Background, false).unwrap(),
            AcquireOutcome::Busy
        ));

        lease.release();
        assert_eq!(arbiter.holder().holder, LeaseHolder::None);
        assert!(arbiter.holder().acquired_at.is_none());
        let _bg = granted(arbiter.acquire(LeaseRole::Background, false).unwrap());
        assert_eq!(arbiter.holder().holder, LeaseHolder::Background);
    }

    #[test]
    fn every_lease_opens_a_fresh_session() {
        let (arbiter, device) = arbiter();
        drop(granted(arbiter.acquire(LeaseRole::Background, true).unwrap()));
        drop(granted(arbiter.acquire(LeaseRole::Active, true).unwrap()));
        assert_eq!(device.opened(), 2);
    }

    #[test]
    fn open_failure_frees_the_slot() {
        let (arbiter, device) = arbiter();
        device.fail_next_open();
        let err = arbiter.acquire(LeaseRole::Active, true).unwrap_err();
        assert!(matches!(err, SpeechError::DeviceUnavailable(_)));
        assert!(!arbiter.is_held());
        assert!(arbiter.acquire(LeaseRole::Active, false).is_ok());
    }

    #[test]
    fn blocking_acquire_waits_for_release() {
        let (arbiter, _) = arbiter();
        let lease = granted(arbiter.acquire(LeaseRole::Background, true).unwrap());

        let waiter = {
            let arbiter = arbiter.clone();
            std::thread::spawn(move || {
                let lease = granted(arbiter.acquire(LeaseRole::Active, true).unwrap());
                lease.role()
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(arbiter.holder().holder, LeaseHolder::Background);
        drop(lease);
        assert_eq!(waiter.join().unwrap(), LeaseRole::Active);
    }

    #[test]
    fn concurrent_acquires_grant_one_lease_at_a_time() {
        let (arbiter, _) = arbiter();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let arbiter = arbiter.clone();
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                std::thread::spawn(move || {
                    let role = if i % 2 == 0 {
                        LeaseRole::Active
                    } else {
                        LeaseRole::Background
                    };
                    for _ in 0..20 {
                        let lease = granted(arbiter.acquire(role, true).unwrap());
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        std::thread::yield_now();
                        inside.fetch_sub(1, Ordering::SeqCst);
                        drop(lease);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(!arbiter.is_held());
    }

    #[test]
    fn exclusive_flag_start_stop() {
        let flag = ExclusiveFlag::new();
        assert!(!flag.try_stop());
        assert!(flag.try_start());
        assert!(!flag.try_start());
        assert!(flag.is_busy());
        assert!(flag.try_stop());
        assert!(!flag.is_busy());
    }
}
