//! Spoken responses.
//!
//! Synthesis engines plug in through [`SpeechSink`]. [`Speaker`] wraps a sink
//! with the response-style policy: nothing is spoken in the `silent` style,
//! and [`Speaker::say`] never blocks the caller.

use crate::config::{ResponseStyle, SettingsStore};
use crate::error::{Result, SpeechError};
use std::sync::Arc;
use tracing::{debug, error, info};

/// A text-to-speech engine. `speak` blocks until the phrase has been spoken.
pub trait SpeechSink: Send + Sync {
    /// Speak `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if synthesis or playback fails.
    fn speak(&self, text: &str) -> Result<()>;
}

/// A sink that only logs. Used when no synthesis engine is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl SpeechSink for LogSink {
    fn speak(&self, text: &str) -> Result<()> {
        info!("speaking: {text}");
        Ok(())
    }
}

/// Response-style aware front-end over a [`SpeechSink`].
#[derive(Clone)]
pub struct Speaker {
    sink: Arc<dyn SpeechSink>,
    settings: Arc<SettingsStore>,
}

impl Speaker {
    pub fn new(sink: Arc<dyn SpeechSink>, settings: Arc<SettingsStore>) -> Self {
        Self { sink, settings }
    }

    /// Whether the current response style suppresses speech.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.settings.read().response.style == ResponseStyle::Silent
    }

    /// Speak on a separate thread and return immediately.
    pub fn say(&self, text: &str) {
        if self.is_silent() {
            debug!("silent mode, not speaking: {text}");
            return;
        }
        let sink = Arc::clone(&self.sink);
        let text = text.to_owned();
        let spawned = std::thread::Builder::new()
            .name("hark-tts".into())
            .spawn(move || {
                if let Err(e) = sink.speak(&text) {
                    error!("TTS failed: {e}");
                }
            });
        if let Err(e) = spawned {
            error!("cannot spawn TTS thread: {e}");
        }
    }

    /// Speak on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails.
    pub fn say_blocking(&self, text: &str) -> Result<()> {
        if self.is_silent() {
            debug!("silent mode, not speaking: {text}");
            return Ok(());
        }
        self.sink
            .speak(text)
            .map_err(|e| SpeechError::Tts(e.to_string()))
    }
}
