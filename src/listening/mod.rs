//! Listening modes: background wake-phrase watch, active command capture,
//! and typed input, coordinated by one state machine.

mod background;
pub mod machine;
pub mod state;

pub use machine::{
    ListeningStateMachine, MachineParts, NO_SPEECH_RESPONSE, SERVICE_ERROR_RESPONSE,
    UNINTELLIGIBLE_RESPONSE,
};
pub use state::{ListeningSession, ListeningState};
