//! Speech-to-text front-end.
//!
//! Concrete engines live outside this crate and plug in through
//! [`SpeechRecognizer`]. [`FallbackRecognizer`] applies the configured engine
//! policy: with [`SpeechEngine::OnlineFirst`] the network engine is tried
//! first and the offline engine gets a second chance whenever the first one
//! fails or hears nothing intelligible.

use crate::audio::SpeechSegment;
use crate::config::{SettingsStore, SpeechEngine};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What a recognizer made of a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionOutcome {
    /// Recognized text.
    Text(String),
    /// Audio was received but could not be understood.
    Unintelligible,
    /// The engine gave up waiting.
    Timeout,
    /// The engine failed (network, quota, crash).
    ServiceError(String),
}

impl RecognitionOutcome {
    fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }
}

/// A speech recognition engine.
pub trait SpeechRecognizer: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Recognize a segment. Must not panic; failures are reported as outcomes.
    fn recognize(&self, segment: &SpeechSegment) -> RecognitionOutcome;
}

/// Applies the [`SpeechEngine`] policy over an online and an offline engine.
///
/// The policy is read from the settings on every call, so a change takes
/// effect on the next utterance.
pub struct FallbackRecognizer {
    online: Option<Arc<dyn SpeechRecognizer>>,
    offline: Option<Arc<dyn SpeechRecognizer>>,
    settings: Arc<SettingsStore>,
}

impl FallbackRecognizer {
    pub fn new(
        online: Option<Arc<dyn SpeechRecognizer>>,
        offline: Option<Arc<dyn SpeechRecognizer>>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        Self {
            online,
            offline,
            settings,
        }
    }

    /// Recognize with the configured policy.
    pub fn recognize(&self, segment: &SpeechSegment) -> RecognitionOutcome {
        let engine = self.settings.read().stt.engine;
        match engine {
            SpeechEngine::OnlineOnly => run(self.online.as_deref(), segment),
            SpeechEngine::OfflineOnly => run(self.offline.as_deref(), segment),
            SpeechEngine::OnlineFirst => {
                let first = run(self.online.as_deref(), segment);
                if first.is_text() || self.offline.is_none() {
                    return first;
                }
                info!("online recognition gave {first:?}, trying offline engine");
                let second = run(self.offline.as_deref(), segment);
                // Prefer "could not understand" over a bare service failure.
                if first == RecognitionOutcome::Unintelligible
                    && matches!(second, RecognitionOutcome::ServiceError(_))
                {
                    first
                } else {
                    second
                }
            }
        }
    }
}

impl SpeechRecognizer for FallbackRecognizer {
    fn name(&self) -> &str {
        "fallback"
    }

    fn recognize(&self, segment: &SpeechSegment) -> RecognitionOutcome {
        FallbackRecognizer::recognize(self, segment)
    }
}

fn run(engine: Option<&dyn SpeechRecognizer>, segment: &SpeechSegment) -> RecognitionOutcome {
    let Some(engine) = engine else {
        return RecognitionOutcome::ServiceError("no recognizer configured".into());
    };

    let started = Instant::now();
    let outcome = match engine.recognize(segment) {
        RecognitionOutcome::Text(text) if text.trim().is_empty() => {
            RecognitionOutcome::Unintelligible
        }
        RecognitionOutcome::Text(text) => RecognitionOutcome::Text(text.trim().to_owned()),
        other => other,
    };

    match &outcome {
        RecognitionOutcome::Text(text) => info!(
            engine = engine.name(),
            "recognized in {}ms: \"{text}\"",
            started.elapsed().as_millis()
        ),
        RecognitionOutcome::ServiceError(e) => {
            warn!(engine = engine.name(), "recognition service error: {e}");
        }
        other => debug!(engine = engine.name(), "recognition outcome: {other:?}"),
    }
    outcome
}
