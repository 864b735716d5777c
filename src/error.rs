//! Error types for the hark assistant core.

/// Top-level error type for the assistant.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    /// Microphone busy, missing, or refused by the OS. Transient: retry after a backoff.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Audio stream error after the device was opened.
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text backend failure.
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech output failure.
    #[error("TTS error: {0}")]
    Tts(String),

    /// An action failed while executing.
    #[error("action error: {0}")]
    Action(String),

    /// Command table load/save or edit error.
    #[error("command table error: {0}")]
    Commands(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Notes storage error.
    #[error("notes error: {0}")]
    Notes(String),

    /// Reminder scheduler error.
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// Listening state machine error (rejected transition, worker spawn failure).
    #[error("listening error: {0}")]
    Listening(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, SpeechError>;
