//! Hark: command interpretation and listening core for a voice assistant.
//!
//! The crate turns speech (or typed text) into actions while sharing one
//! microphone between a background wake-phrase loop and active command
//! capture:
//!
//! Microphone → arbiter lease → VAD → STT → resolver → action → TTS
//!
//! # Architecture
//!
//! - **Similarity**: `similarity` scores short strings (full, partial, token-sort)
//! - **Commands**: `voice_command` holds the editable command table and the
//!   exact → fuzzy → pattern-rule resolver
//! - **Microphone**: `audio::arbiter` serializes access to the capture device;
//!   `audio::capture` and `vad` implement it on top of `cpal`
//! - **Listening**: `listening` runs the state machine, the wake loop and
//!   typed input; `dispatch` is its processing step
//! - **Reminders**: `scheduler` fires delayed reminders on a tokio runtime
//! - **Speech engines**: `stt` and `tts` define the recognizer and speaker seams

pub mod actions;
pub mod app_dirs;
pub mod audio;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod listening;
pub mod locate;
pub mod notes;
pub mod runtime;
pub mod scheduler;
pub mod similarity;
pub mod stt;
pub mod tts;
pub mod vad;
pub mod voice_command;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{AssistantConfig, SettingsStore};
pub use dispatch::CommandDispatcher;
pub use error::{Result, SpeechError};
pub use listening::{ListeningState, ListeningStateMachine, MachineParts};
pub use runtime::{EventHub, RuntimeEvent};
pub use voice_command::{CommandResolver, CommandStore, CommandTable, Resolution};
