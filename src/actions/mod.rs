//! Action execution.
//!
//! [`ActionExecutor`] is the seam between command resolution and whatever
//! carries the action out. [`BuiltinExecutor`] answers everything that needs
//! no operating-system access itself (time, jokes, reminders, notes, name
//! lookup) and hands the rest to a [`HostActions`] implementation.

mod builtin;
mod host;

pub use builtin::{BuiltinExecutor, JOKES};
pub use host::DryRunHost;

use crate::error::Result;
use crate::voice_command::{ActionKind, Params};

/// Executes resolved commands.
pub trait ActionExecutor: Send + Sync {
    /// Run `action` and return the text to say back.
    ///
    /// # Errors
    ///
    /// Returns an error if the action fails. The caller turns it into a
    /// spoken apology.
    fn execute(&self, action: ActionKind, params: &Params) -> Result<String>;
}

/// Operating-system side of actions: launching programs, screenshots, power
/// management, browsers.
///
/// Parameters have already been validated and normalized by
/// [`BuiltinExecutor`]; `open_folder` and `open_file` receive a resolved
/// `path`.
pub trait HostActions: Send + Sync {
    /// Carry out `action`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot perform the action.
    fn perform(&self, action: ActionKind, params: &Params) -> Result<String>;
}
