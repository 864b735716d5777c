//! The command table: trigger phrases mapped to action descriptors.
//!
//! Triggers are unique after normalization (trimmed, lowercased, inner
//! whitespace collapsed). Insertion order is significant: the exact-prefix
//! pass of the resolver walks entries in order, so `"play music"` must come
//! before the bare `"play"` trigger.
//!
//! On disk the table is a JSON object whose key order is the table order:
//!
//! ```json
//! {
//!   "what time is it": { "action": "say_time", "params": {}, "dynamic": false },
//!   "search for":      { "action": "search_web", "params": {}, "dynamic": true }
//! }
//! ```

use crate::config::write_atomic;
use crate::error::{Result, SpeechError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{RwLock, RwLockReadGuard};
use tracing::{info, warn};

/// String parameters passed to an action.
pub type Params = BTreeMap<String, String>;

/// Every action the assistant knows how to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SayTime,
    SayDay,
    SayText,
    TellJoke,
    OpenApp,
    RunCommand,
    TypeText,
    CheckBattery,
    TakeScreenshot,
    MuteVolume,
    ShutdownPc,
    RestartPc,
    CancelShutdown,
    LockComputer,
    GetSystemInfo,
    SearchWeb,
    PlayYoutube,
    SearchWikipedia,
    OpenWebsite,
    ScreenRecording,
    DictateToFile,
    MonitorResources,
    ScheduleTask,
    OpenFolder,
    OpenFile,
    CreateNote,
    ReadNote,
    ListNotes,
    DeleteNote,
}

impl ActionKind {
    /// All kinds, in declaration order.
    pub const ALL: [ActionKind; 29] = [
        Self::SayTime,
        Self::SayDay,
        Self::SayText,
        Self::TellJoke,
        Self::OpenApp,
        Self::RunCommand,
        Self::TypeText,
        Self::CheckBattery,
        Self::TakeScreenshot,
        Self::MuteVolume,
        Self::ShutdownPc,
        Self::RestartPc,
        Self::CancelShutdown,
        Self::LockComputer,
        Self::GetSystemInfo,
        Self::SearchWeb,
        Self::PlayYoutube,
        Self::SearchWikipedia,
        Self::OpenWebsite,
        Self::ScreenRecording,
        Self::DictateToFile,
        Self::MonitorResources,
        Self::ScheduleTask,
        Self::OpenFolder,
        Self::OpenFile,
        Self::CreateNote,
        Self::ReadNote,
        Self::ListNotes,
        Self::DeleteNote,
    ];

    /// The snake_case name used in the persisted document.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SayTime => "say_time",
            Self::SayDay => "say_day",
            Self::SayText => "say_text",
            Self::TellJoke => "tell_joke",
            Self::OpenApp => "open_app",
            Self::RunCommand => "run_command",
            Self::TypeText => "type_text",
            Self::CheckBattery => "check_battery",
            Self::TakeScreenshot => "take_screenshot",
            Self::MuteVolume => "mute_volume",
            Self::ShutdownPc => "shutdown_pc",
            Self::RestartPc => "restart_pc",
            Self::CancelShutdown => "cancel_shutdown",
            Self::LockComputer => "lock_computer",
            Self::GetSystemInfo => "get_system_info",
            Self::SearchWeb => "search_web",
            Self::PlayYoutube => "play_youtube",
            Self::SearchWikipedia => "search_wikipedia",
            Self::OpenWebsite => "open_website",
            Self::ScreenRecording => "screen_recording",
            Self::DictateToFile => "dictate_to_file",
            Self::MonitorResources => "monitor_resources",
            Self::ScheduleTask => "schedule_task",
            Self::OpenFolder => "open_folder",
            Self::OpenFile => "open_file",
            Self::CreateNote => "create_note",
            Self::ReadNote => "read_note",
            Self::ListNotes => "list_notes",
            Self::DeleteNote => "delete_note",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = SpeechError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| SpeechError::Commands(format!("unknown action: {s}")))
    }
}

/// What a trigger does: an action, its static parameters, and whether the
/// words after the trigger are passed along as `query`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub action: ActionKind,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub dynamic: bool,
}

impl ActionDescriptor {
    /// Descriptor with no parameters.
    #[must_use]
    pub fn simple(action: ActionKind) -> Self {
        Self {
            action,
            params: Params::new(),
            dynamic: false,
        }
    }

    /// Descriptor that takes the rest of the utterance as `query`.
    #[must_use]
    pub fn dynamic(action: ActionKind) -> Self {
        Self {
            dynamic: true,
            ..Self::simple(action)
        }
    }

    /// Add a static parameter.
    #[must_use]
    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_owned(), value.to_owned());
        self
    }
}

/// One row of the command table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEntry {
    /// Normalized trigger phrase.
    pub trigger: String,
    pub descriptor: ActionDescriptor,
}

/// Shorthand kinds used when teaching a new command.
///
/// Each maps the user's free-text detail onto a concrete action and parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeachKind {
    /// Launch an application (`open_app{app}`).
    App,
    /// Search the web (`search_web{query}`).
    Website,
    /// Open a folder (`open_folder{path}`).
    Folder,
    /// Run a shell command (`run_command{cmd}`).
    Command,
    /// Type text into the focused window (`type_text{text}`).
    Text,
    /// Speak a fixed phrase (`say_text{text}`).
    Say,
}

impl TeachKind {
    /// Build the descriptor for this kind with the given detail.
    #[must_use]
    pub fn descriptor(self, detail: &str) -> ActionDescriptor {
        let detail = detail.trim();
        match self {
            Self::App => ActionDescriptor::simple(ActionKind::OpenApp).with_param("app", detail),
            Self::Website => {
                ActionDescriptor::simple(ActionKind::SearchWeb).with_param("query", detail)
            }
            Self::Folder => {
                ActionDescriptor::simple(ActionKind::OpenFolder).with_param("path", detail)
            }
            Self::Command => {
                ActionDescriptor::simple(ActionKind::RunCommand).with_param("cmd", detail)
            }
            Self::Text => ActionDescriptor::simple(ActionKind::TypeText).with_param("text", detail),
            Self::Say => ActionDescriptor::simple(ActionKind::SayText).with_param("text", detail),
        }
    }
}

impl FromStr for TeachKind {
    type Err = SpeechError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "app" => Ok(Self::App),
            "website" => Ok(Self::Website),
            "folder" => Ok(Self::Folder),
            "command" => Ok(Self::Command),
            "text" => Ok(Self::Text),
            "say" => Ok(Self::Say),
            other => Err(SpeechError::Commands(format!("unknown command kind: {other}"))),
        }
    }
}

/// Normalize a trigger or utterance: trim, lowercase, collapse inner whitespace.
#[must_use]
pub fn normalize_phrase(s: &str) -> String {
    s.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Ordered, unique-keyed command table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandTable {
    entries: Vec<CommandEntry>,
}

impl CommandTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in command set.
    #[must_use]
    pub fn defaults() -> Self {
        use ActionKind as A;
        let rows = [
            ("what time is it", ActionDescriptor::simple(A::SayTime)),
            ("what's the day today", ActionDescriptor::simple(A::SayDay)),
            (
                "open notepad",
                ActionDescriptor::simple(A::OpenApp).with_param("app", "notepad.exe"),
            ),
            (
                "play music",
                ActionDescriptor::simple(A::OpenApp).with_param("app", "spotify.exe"),
            ),
            ("check battery", ActionDescriptor::simple(A::CheckBattery)),
            ("take screenshot", ActionDescriptor::simple(A::TakeScreenshot)),
            ("mute volume", ActionDescriptor::simple(A::MuteVolume)),
            ("shutdown pc", ActionDescriptor::simple(A::ShutdownPc)),
            ("tell me a joke", ActionDescriptor::simple(A::TellJoke)),
            ("system info", ActionDescriptor::simple(A::GetSystemInfo)),
            ("lock computer", ActionDescriptor::simple(A::LockComputer)),
            ("search for", ActionDescriptor::dynamic(A::SearchWeb)),
            ("play", ActionDescriptor::dynamic(A::PlayYoutube)),
            ("who is", ActionDescriptor::dynamic(A::SearchWikipedia)),
            ("what is", ActionDescriptor::dynamic(A::SearchWikipedia)),
            (
                "start recording",
                ActionDescriptor::simple(A::ScreenRecording).with_param("action", "start"),
            ),
            (
                "stop recording",
                ActionDescriptor::simple(A::ScreenRecording).with_param("action", "stop"),
            ),
            ("dictate", ActionDescriptor::simple(A::DictateToFile)),
            ("monitor resources", ActionDescriptor::simple(A::MonitorResources)),
            ("remind me", ActionDescriptor::dynamic(A::ScheduleTask)),
            ("open folder", ActionDescriptor::dynamic(A::OpenFolder)),
            ("open file", ActionDescriptor::dynamic(A::OpenFile)),
            ("create note", ActionDescriptor::dynamic(A::CreateNote)),
            ("read note", ActionDescriptor::dynamic(A::ReadNote)),
            ("list notes", ActionDescriptor::simple(A::ListNotes)),
            ("delete note", ActionDescriptor::dynamic(A::DeleteNote)),
        ];

        let mut table = Self::new();
        for (trigger, descriptor) in rows {
            table.entries.push(CommandEntry {
                trigger: trigger.to_owned(),
                descriptor,
            });
        }
        table
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in table order.
    pub fn iter(&self) -> impl Iterator<Item = &CommandEntry> {
        self.entries.iter()
    }

    /// Look up a trigger (normalized before comparison).
    #[must_use]
    pub fn get(&self, trigger: &str) -> Option<&CommandEntry> {
        let key = normalize_phrase(trigger);
        self.entries.iter().find(|e| e.trigger == key)
    }

    /// Insert or replace a trigger. A replaced entry keeps its position.
    ///
    /// Returns `true` when an existing entry was replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the trigger is empty after normalization.
    pub fn upsert(&mut self, trigger: &str, descriptor: ActionDescriptor) -> Result<bool> {
        let key = checked_trigger(trigger)?;
        if let Some(existing) = self.entries.iter_mut().find(|e| e.trigger == key) {
            existing.descriptor = descriptor;
            return Ok(true);
        }
        self.entries.push(CommandEntry {
            trigger: key,
            descriptor,
        });
        Ok(false)
    }

    /// Replace the entry for `old` with `new` → `descriptor`, keeping its position.
    ///
    /// If `new` already names a different entry, that entry is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if `old` does not exist or `new` is empty.
    pub fn edit(&mut self, old: &str, new: &str, descriptor: ActionDescriptor) -> Result<()> {
        let old_key = normalize_phrase(old);
        let new_key = checked_trigger(new)?;
        if !self.entries.iter().any(|e| e.trigger == old_key) {
            return Err(SpeechError::Commands(format!("no such command: {old_key}")));
        }

        if new_key != old_key {
            self.entries.retain(|e| e.trigger != new_key);
        }
        if let Some(entry) = self.entries.iter_mut().find(|e| e.trigger == old_key) {
            *entry = CommandEntry {
                trigger: new_key,
                descriptor,
            };
        }
        Ok(())
    }

    /// Remove a trigger.
    pub fn remove(&mut self, trigger: &str) -> Option<CommandEntry> {
        let key = normalize_phrase(trigger);
        let position = self.entries.iter().position(|e| e.trigger == key)?;
        Some(self.entries.remove(position))
    }

    /// Entries whose trigger or action name contains `query` (case-insensitive).
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&CommandEntry> {
        let needle = normalize_phrase(query);
        self.entries
            .iter()
            .filter(|e| e.trigger.contains(&needle) || e.descriptor.action.as_str().contains(&needle))
            .collect()
    }

    /// Upsert every entry of `other`, in its order. Returns how many were merged.
    pub fn merge(&mut self, other: CommandTable) -> usize {
        let count = other.entries.len();
        for entry in other.entries {
            if let Some(existing) = self.entries.iter_mut().find(|e| e.trigger == entry.trigger) {
                existing.descriptor = entry.descriptor;
            } else {
                self.entries.push(entry);
            }
        }
        count
    }

    /// Parse a JSON command document.
    ///
    /// Keys are normalized; a key that normalizes to an earlier one replaces it.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a JSON object, a value is not a
    /// valid descriptor, or a key is empty.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)
            .map_err(|e| SpeechError::Commands(format!("invalid command document: {e}")))?;

        let mut table = Self::new();
        for (trigger, value) in document {
            let descriptor: ActionDescriptor = serde_json::from_value(value).map_err(|e| {
                SpeechError::Commands(format!("invalid command '{trigger}': {e}"))
            })?;
            table.upsert(&trigger, descriptor)?;
        }
        Ok(table)
    }

    /// Serialize to a pretty-printed JSON document in table order.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        let mut document = serde_json::Map::new();
        for entry in &self.entries {
            let value = serde_json::to_value(&entry.descriptor)
                .map_err(|e| SpeechError::Commands(e.to_string()))?;
            document.insert(entry.trigger.clone(), value);
        }
        serde_json::to_string_pretty(&document).map_err(|e| SpeechError::Commands(e.to_string()))
    }

    /// Load a table from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Save the table atomically (temp file + rename).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.to_json()?)
    }
}

fn checked_trigger(trigger: &str) -> Result<String> {
    let key = normalize_phrase(trigger);
    if key.is_empty() {
        return Err(SpeechError::Commands("trigger cannot be empty".into()));
    }
    Ok(key)
}

// ── CommandStore ───────────────────────────────────────────────────────────

/// Shared command table with persisting mutations.
///
/// Readers hold a read guard for the duration of one resolution; every
/// mutation takes the write lock, applies the change, and saves the whole
/// table when the store has a backing file.
pub struct CommandStore {
    table: RwLock<CommandTable>,
    path: Option<PathBuf>,
}

impl CommandStore {
    /// Store backed by `path`, never persisted when `None`.
    pub fn new(table: CommandTable, path: Option<PathBuf>) -> Self {
        Self {
            table: RwLock::new(table),
            path,
        }
    }

    /// In-memory store.
    pub fn in_memory(table: CommandTable) -> Self {
        Self::new(table, None)
    }

    /// Load the table at `path`, or write the defaults there if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be parsed or the defaults
    /// cannot be written.
    pub fn open(path: PathBuf) -> Result<Self> {
        let table = if path.exists() {
            let table = CommandTable::load(&path)?;
            info!(count = table.len(), "loaded commands from {}", path.display());
            table
        } else {
            let table = CommandTable::defaults();
            table.save(&path)?;
            info!("wrote default commands to {}", path.display());
            table
        };
        Ok(Self::new(table, Some(path)))
    }

    /// Borrow the current table.
    pub fn read(&self) -> RwLockReadGuard<'_, CommandTable> {
        self.table.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Clone the current table.
    #[must_use]
    pub fn snapshot(&self) -> CommandTable {
        self.read().clone()
    }

    /// Add or replace a command. Returns `true` when it replaced one.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty trigger or when saving fails.
    pub fn teach(&self, trigger: &str, descriptor: ActionDescriptor) -> Result<bool> {
        let replaced = self.update(|t| t.upsert(trigger, descriptor))?;
        info!(trigger = %normalize_phrase(trigger), replaced, "command saved");
        Ok(replaced)
    }

    /// Edit a command, possibly renaming its trigger.
    ///
    /// # Errors
    ///
    /// Returns an error if `old` does not exist, `new` is empty, or saving fails.
    pub fn edit(&self, old: &str, new: &str, descriptor: ActionDescriptor) -> Result<()> {
        self.update(|t| t.edit(old, new, descriptor))
    }

    /// Delete a command. Returns `false` when it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error when saving fails.
    pub fn remove(&self, trigger: &str) -> Result<bool> {
        let removed = self.update(|t| Ok(t.remove(trigger).is_some()))?;
        if removed {
            info!(trigger = %normalize_phrase(trigger), "command deleted");
        }
        Ok(removed)
    }

    /// Replace the table with the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error when saving fails.
    pub fn reset_to_defaults(&self) -> Result<()> {
        self.update(|t| {
            *t = CommandTable::defaults();
            Ok(())
        })?;
        info!("commands reset to defaults");
        Ok(())
    }

    /// Merge commands from a JSON file. The file is fully parsed before
    /// anything changes. Returns the number of imported commands.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or saving fails.
    pub fn import(&self, path: &Path) -> Result<usize> {
        let incoming = CommandTable::load(path)?;
        let count = self.update(|t| Ok(t.merge(incoming)))?;
        info!(count, "imported commands from {}", path.display());
        Ok(count)
    }

    /// Write the current table to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn export(&self, path: &Path) -> Result<()> {
        self.read().save(path)
    }

    fn update<T>(&self, apply: impl FnOnce(&mut CommandTable) -> Result<T>) -> Result<T> {
        let mut guard = self
            .table
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = guard.clone();
        let out = apply(&mut next)?;
        if let Some(path) = &self.path {
            next.save(path).inspect_err(|e| {
                warn!("cannot persist commands to {}: {e}", path.display());
            })?;
        }
        *guard = next;
        Ok(out)
    }
}
