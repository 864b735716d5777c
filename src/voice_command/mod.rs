//! Voice command interpretation.
//!
//! Turns recognized or typed text into an action. The user-editable
//! [`CommandTable`] is consulted first (exact prefix, then fuzzy), and a fixed
//! list of pattern rules catches common phrasings the table does not cover.
//!
//! # Default Commands
//!
//! | Phrase | Action |
//! |--------|--------|
//! | "what time is it" | `say_time` |
//! | "search for {query}" | `search_web` |
//! | "play {query}" | `play_youtube` |
//! | "who is / what is {query}" | `search_wikipedia` |
//! | "remind me {query}" | `schedule_task` |
//! | "create / read / delete note {query}" | notes |
//! | "open folder / open file {query}" | near-name lookup |

pub mod resolver;
pub mod rules;
pub mod table;

pub use resolver::{CommandResolver, MatchTier, Resolution, ResolvedCommand};
pub use table::{
    ActionDescriptor, ActionKind, CommandEntry, CommandStore, CommandTable, Params, TeachKind,
    normalize_phrase,
};
