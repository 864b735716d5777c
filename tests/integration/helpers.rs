//! Shared helpers for integration tests: a scripted microphone, a scripted
//! recognizer, a recording speaker, and a fully wired assistant.

use hark::actions::{BuiltinExecutor, DryRunHost};
use hark::audio::{
    CaptureDevice, CaptureSession, LeaseRole, ListenOutcome, MicrophoneArbiter, SpeechSegment,
};
use hark::config::{AssistantConfig, ListenWindow};
use hark::history::CommandHistory;
use hark::locate::Locator;
use hark::notes::NotesStore;
use hark::stt::{RecognitionOutcome, SpeechRecognizer};
use hark::tts::{SpeechSink, Speaker};
use hark::{
    CommandDispatcher, CommandResolver, CommandStore, CommandTable, EventHub,
    ListeningStateMachine, MachineParts, RuntimeEvent, SettingsStore,
};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

pub(crate) fn segment() -> SpeechSegment {
    SpeechSegment {
        samples: vec![0.0; 1_600],
        sample_rate: 16_000,
        started_at: Instant::now(),
    }
}

/// Sessions hear speech while scripted utterances remain, silence after.
#[derive(Default)]
pub(crate) struct FakeMic {
    background: Arc<Mutex<VecDeque<bool>>>,
    active: Arc<Mutex<VecDeque<bool>>>,
}

impl FakeMic {
    /// Queue one listen result (`true` = speech) for `role`.
    pub(crate) fn push(&self, role: LeaseRole, speech: bool) {
        let queue = match role {
            LeaseRole::Background => &self.background,
            LeaseRole::Active => &self.active,
        };
        queue.lock().unwrap().push_back(speech);
    }
}

impl CaptureDevice for FakeMic {
    fn open(&self, role: LeaseRole) -> hark::Result<Box<dyn CaptureSession>> {
        let queue = match role {
            LeaseRole::Background => Arc::clone(&self.background),
            LeaseRole::Active => Arc::clone(&self.active),
        };
        Ok(Box::new(FakeSession { queue }))
    }
}

struct FakeSession {
    queue: Arc<Mutex<VecDeque<bool>>>,
}

impl CaptureSession for FakeSession {
    fn listen(&mut self, _window: ListenWindow) -> hark::Result<ListenOutcome> {
        let next = self.queue.lock().unwrap().pop_front();
        match next {
            Some(true) => Ok(ListenOutcome::Speech(segment())),
            Some(false) => Ok(ListenOutcome::Timeout),
            None => {
                std::thread::sleep(Duration::from_millis(5));
                Ok(ListenOutcome::Timeout)
            }
        }
    }
}

/// Replays recognized phrases in order.
#[derive(Default)]
pub(crate) struct FakeRecognizer {
    outcomes: Mutex<VecDeque<RecognitionOutcome>>,
}

impl FakeRecognizer {
    pub(crate) fn hears(&self, text: &str) {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(RecognitionOutcome::Text(text.to_owned()));
    }
}

impl SpeechRecognizer for FakeRecognizer {
    fn name(&self) -> &str {
        "fake"
    }

    fn recognize(&self, _segment: &SpeechSegment) -> RecognitionOutcome {
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(RecognitionOutcome::Unintelligible)
    }
}

/// Collects spoken phrases.
#[derive(Default)]
pub(crate) struct Transcript {
    lines: Mutex<Vec<String>>,
    changed: Condvar,
}

impl Transcript {
    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub(crate) fn wait_for(&self, n: usize) -> Vec<String> {
        let guard = self.lines.lock().unwrap();
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, Duration::from_secs(5), |lines| lines.len() < n)
            .unwrap();
        guard.clone()
    }
}

impl SpeechSink for Transcript {
    fn speak(&self, text: &str) -> hark::Result<()> {
        self.lines.lock().unwrap().push(text.to_owned());
        self.changed.notify_all();
        Ok(())
    }
}

/// A wired assistant over fakes, with notes and settings in a temp dir.
pub(crate) struct TestAssistant {
    pub(crate) machine: ListeningStateMachine,
    pub(crate) arbiter: MicrophoneArbiter,
    pub(crate) mic: Arc<FakeMic>,
    pub(crate) recognizer: Arc<FakeRecognizer>,
    pub(crate) transcript: Arc<Transcript>,
    pub(crate) events: Arc<EventHub>,
    pub(crate) dispatcher: Arc<CommandDispatcher>,
    pub(crate) _dir: tempfile::TempDir,
}

pub(crate) fn assistant() -> TestAssistant {
    let dir = tempfile::tempdir().expect("create temp dir");
    let mut config = AssistantConfig::default();
    config.listening.idle_poll_ms = 5;
    config.listening.device_retry_ms = 5;
    config.listening.service_retry_ms = 5;
    config.wakeword.cooldown_secs = 0;
    let settings = Arc::new(SettingsStore::new(config, Some(dir.path().join("config.toml"))));

    let mic = Arc::new(FakeMic::default());
    let recognizer = Arc::new(FakeRecognizer::default());
    let transcript = Arc::new(Transcript::default());
    let events = Arc::new(EventHub::new());

    let executor = BuiltinExecutor::new(
        Arc::new(DryRunHost),
        NotesStore::open(dir.path().join("notes")).expect("open notes"),
        Locator::new(vec![dir.path().to_path_buf()]),
    );
    let dispatcher = Arc::new(CommandDispatcher::new(
        Arc::new(CommandStore::in_memory(CommandTable::defaults())),
        CommandResolver::default(),
        Arc::new(executor),
        Arc::new(CommandHistory::new(&settings.read().history)),
        Arc::clone(&events),
    ));
    let arbiter = MicrophoneArbiter::new(mic.clone());
    let machine = ListeningStateMachine::new(MachineParts {
        arbiter: arbiter.clone(),
        recognizer: recognizer.clone(),
        dispatcher: Arc::clone(&dispatcher),
        speaker: Speaker::new(transcript.clone(), Arc::clone(&settings)),
        settings,
        events: Arc::clone(&events),
    });

    TestAssistant {
        machine,
        arbiter,
        mic,
        recognizer,
        transcript,
        events,
        dispatcher,
        _dir: dir,
    }
}

/// Poll `condition` for up to five seconds.
pub(crate) fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(2));
    }
}

/// Drain pending events.
pub(crate) fn drain(rx: &crossbeam_channel::Receiver<RuntimeEvent>) -> Vec<RuntimeEvent> {
    rx.try_iter().collect()
}
