//! The processing step of a listening cycle: text in, spoken response out.

use crate::actions::ActionExecutor;
use crate::error::Result;
use crate::history::{CommandHistory, HistoryEntry};
use crate::runtime::{EventHub, RuntimeEvent};
use crate::voice_command::{ActionDescriptor, CommandResolver, CommandStore, Resolution};
use chrono::Local;
use std::sync::Arc;
use tracing::{info, warn};

/// Response when no tier resolves the text.
pub const UNRECOGNIZED_RESPONSE: &str = "I don't know how to do that yet.";

/// What happened to one piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub resolution: Resolution,
    /// Text to say back, hedge included.
    pub response: String,
}

/// Resolves text against the command table and executes the result.
///
/// Records every command in the history and publishes
/// [`RuntimeEvent::CommandResolved`] or [`RuntimeEvent::CommandUnrecognized`].
/// Never fails: execution errors become an apology.
pub struct CommandDispatcher {
    commands: Arc<CommandStore>,
    resolver: CommandResolver,
    executor: Arc<dyn ActionExecutor>,
    history: Arc<CommandHistory>,
    events: Arc<EventHub>,
}

impl CommandDispatcher {
    pub fn new(
        commands: Arc<CommandStore>,
        resolver: CommandResolver,
        executor: Arc<dyn ActionExecutor>,
        history: Arc<CommandHistory>,
        events: Arc<EventHub>,
    ) -> Self {
        Self {
            commands,
            resolver,
            executor,
            history,
            events,
        }
    }

    #[must_use]
    pub fn commands(&self) -> &Arc<CommandStore> {
        &self.commands
    }

    #[must_use]
    pub fn history(&self) -> &Arc<CommandHistory> {
        &self.history
    }

    /// Resolve without executing.
    #[must_use]
    pub fn resolve(&self, text: &str) -> Resolution {
        let table = self.commands.read();
        self.resolver.resolve(text, &table)
    }

    /// Teach `trigger` and drop it from the unrecognized list.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty trigger or when the table cannot be saved.
    pub fn teach(&self, trigger: &str, descriptor: ActionDescriptor) -> Result<bool> {
        let replaced = self.commands.teach(trigger, descriptor)?;
        self.history.forget_unrecognized(trigger);
        Ok(replaced)
    }

    /// Resolve and execute `text`.
    pub fn dispatch(&self, text: &str) -> Dispatched {
        let resolution = self.resolve(text);

        let response = match &resolution {
            Resolution::Resolved(cmd) => {
                let trigger = cmd
                    .matched_trigger
                    .clone()
                    .or_else(|| cmd.rule.map(str::to_owned))
                    .unwrap_or_default();
                self.events.publish(RuntimeEvent::CommandResolved {
                    text: text.to_owned(),
                    trigger,
                    tier: cmd.tier,
                    confidence: cmd.confidence,
                });

                let response = match self.executor.execute(cmd.action, &cmd.params) {
                    Ok(response) => response,
                    Err(e) => {
                        warn!(action = %cmd.action, "action failed: {e}");
                        self.events.publish(RuntimeEvent::Error {
                            message: e.to_string(),
                        });
                        format!("Sorry, I encountered an error while executing that command: {e}")
                    }
                };
                cmd.compose_response(&response)
            }
            Resolution::Unresolved => {
                info!("unrecognized command: {text}");
                self.events.publish(RuntimeEvent::CommandUnrecognized {
                    text: text.to_owned(),
                });
                self.history.record_unrecognized(text);
                UNRECOGNIZED_RESPONSE.to_owned()
            }
        };

        self.history.record(HistoryEntry {
            at: Local::now(),
            command: text.to_owned(),
            response: response.clone(),
            tier: resolution.command().map(|cmd| cmd.tier),
        });

        Dispatched {
            resolution,
            response,
        }
    }
}
