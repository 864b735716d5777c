//! Actions answered inside the assistant.

use crate::actions::{ActionExecutor, HostActions};
use crate::audio::ExclusiveFlag;
use crate::error::{Result, SpeechError};
use crate::locate::Locator;
use crate::notes::NotesStore;
use crate::scheduler::ReminderScheduler;
use crate::voice_command::rules::{
    DEFAULT_DICTATION_SECS, DEFAULT_MONITOR_SECS, DEFAULT_MONITOR_THRESHOLD, parse_note,
    parse_reminder,
};
use crate::voice_command::{ActionKind, Params};
use chrono::Local;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Jokes for `tell_joke`.
pub const JOKES: [&str; 10] = [
    "Why don't scientists trust atoms? Because they make up everything!",
    "Why did the scarecrow win an award? Because he was outstanding in his field!",
    "What do you call a fake noodle? An impasta!",
    "How does a computer get drunk? It takes screenshots!",
    "Why don't eggs tell jokes? They'd crack each other up!",
    "Why was the math book sad? It had too many problems!",
    "What do you call a bear with no teeth? A gummy bear!",
    "What's orange and sounds like a parrot? A carrot!",
    "Why did the bicycle fall over? Because it was two-tired!",
    "What's the best time to go to the dentist? Tooth-hurty!",
];

/// The assistant's own action executor.
///
/// Time, date, jokes, reminders, notes and name lookup are handled here.
/// Everything else is validated, normalized and passed to the host.
pub struct BuiltinExecutor {
    host: Arc<dyn HostActions>,
    notes: NotesStore,
    locator: Locator,
    reminders: Option<ReminderScheduler>,
    recording: ExclusiveFlag,
}

impl BuiltinExecutor {
    pub fn new(host: Arc<dyn HostActions>, notes: NotesStore, locator: Locator) -> Self {
        Self {
            host,
            notes,
            locator,
            reminders: None,
            recording: ExclusiveFlag::new(),
        }
    }

    /// Enable `schedule_task` with `scheduler`.
    #[must_use]
    pub fn with_reminders(mut self, scheduler: ReminderScheduler) -> Self {
        self.reminders = Some(scheduler);
        self
    }

    /// Whether a screen recording is running.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.recording.is_busy()
    }

    fn schedule(&self, params: &Params) -> Result<String> {
        let Some(scheduler) = &self.reminders else {
            return Ok("Reminders are not available right now.".to_owned());
        };
        let request = parse_reminder(param(params, "query").unwrap_or(""));
        if request.description.is_empty() {
            return Ok("No task specified.".to_owned());
        }
        let minutes = param(params, "minutes")
            .and_then(|m| m.parse().ok())
            .or(request.minutes)
            .unwrap_or_else(|| scheduler.default_minutes());

        let (_, minutes) = scheduler.schedule_minutes(&request.description, minutes)?;
        let unit = if minutes == 1 { "minute" } else { "minutes" };
        Ok(format!(
            "I'll remind you about {} in {minutes} {unit}.",
            request.description
        ))
    }

    fn recording(&self, params: &Params) -> Result<String> {
        match param(params, "action") {
            Some("start") => {
                if !self.recording.try_start() {
                    return Ok("Recording is already in progress.".to_owned());
                }
                self.host
                    .perform(ActionKind::ScreenRecording, params)
                    .inspect_err(|_| {
                        self.recording.try_stop();
                    })
            }
            Some("stop") => {
                if !self.recording.is_busy() {
                    return Ok("No recording is in progress.".to_owned());
                }
                let response = self.host.perform(ActionKind::ScreenRecording, params)?;
                self.recording.try_stop();
                Ok(response)
            }
            _ => Ok("Invalid recording action.".to_owned()),
        }
    }

    fn open_path(&self, kind: ActionKind, params: &Params) -> Result<String> {
        let (noun, prompt) = match kind {
            ActionKind::OpenFolder => ("folder", "Please specify a folder name."),
            _ => ("file", "Please specify a file name."),
        };

        // A taught command names the path directly.
        let path = if let Some(path) = param(params, "path") {
            PathBuf::from(path)
        } else {
            let Some(name) = param(params, "query") else {
                return Ok(prompt.to_owned());
            };
            let found = match kind {
                ActionKind::OpenFolder => self.locator.find_folder(name),
                _ => self.locator.find_file(name),
            };
            match found {
                Some(path) => path,
                None => return Ok(format!("I couldn't find a {noun} named {name}.")),
            }
        };
        debug!(%kind, "opening {}", path.display());
        self.host.perform(kind, &with(params, "path", &path_string(&path)))
    }

    fn create_note(&self, params: &Params) -> Result<String> {
        let query = param(params, "query");
        let parsed = query.map(parse_note).unwrap_or_default();
        let title = param(params, "title")
            .map(str::to_owned)
            .or(parsed.title);
        let content = param(params, "content")
            .map(str::to_owned)
            .or(parsed.content)
            .or_else(|| query.map(str::to_owned));

        let content = match (content, &title) {
            (Some(content), _) => content,
            (None, Some(_)) => "Empty note".to_owned(),
            (None, None) => return Ok("Please provide content for the note.".to_owned()),
        };
        let title = self.notes.create(title.as_deref(), &content)?;
        Ok(format!("Note created with title: {title}."))
    }

    fn read_note(&self, params: &Params) -> Result<String> {
        let Some(title) = param(params, "query") else {
            return Ok("Please specify a note title.".to_owned());
        };
        Ok(match self.notes.read(title)? {
            Some(note) => format!("Here's your note: {}", note.content),
            None => format!("I couldn't find a note with title {title}."),
        })
    }

    fn list_notes(&self) -> Result<String> {
        let notes = self.notes.list()?;
        Ok(if notes.is_empty() {
            "You don't have any notes yet.".to_owned()
        } else {
            format!("You have {} notes: {}.", notes.len(), notes.join(", "))
        })
    }

    fn delete_note(&self, params: &Params) -> Result<String> {
        let Some(title) = param(params, "query") else {
            return Ok("Please specify a note title to delete.".to_owned());
        };
        Ok(match self.notes.delete(title)? {
            Some(_) => format!("Note {title} deleted."),
            None => format!("I couldn't find a note with title {title} to delete."),
        })
    }

    /// Host action that needs `key`; answers `missing` when it is absent.
    fn host_with(
        &self,
        action: ActionKind,
        params: &Params,
        key: &str,
        missing: &str,
    ) -> Result<String> {
        if param(params, key).is_none() {
            return Ok(missing.to_owned());
        }
        self.host.perform(action, params)
    }
}

impl ActionExecutor for BuiltinExecutor {
    fn execute(&self, action: ActionKind, params: &Params) -> Result<String> {
        match action {
            ActionKind::SayTime => Ok(format!("It's {}.", Local::now().format("%I:%M %p"))),
            ActionKind::SayDay => Ok(format!("Today is {}.", Local::now().format("%A, %B %d"))),
            ActionKind::SayText => Ok(param(params, "text").unwrap_or("Nothing to say.").to_owned()),
            ActionKind::TellJoke => JOKES
                .choose(&mut rand::thread_rng())
                .map(|joke| (*joke).to_owned())
                .ok_or_else(|| SpeechError::Action("no jokes available".into())),
            ActionKind::OpenApp => self.host_with(action, params, "app", "No application specified."),
            ActionKind::RunCommand => self.host_with(action, params, "cmd", "No command specified."),
            ActionKind::TypeText => self.host_with(action, params, "text", "No text specified."),
            ActionKind::SearchWeb | ActionKind::SearchWikipedia => {
                self.host_with(action, params, "query", "No search query specified.")
            }
            ActionKind::PlayYoutube => self.host_with(action, params, "query", "No video specified."),
            ActionKind::OpenWebsite => self.host_with(action, params, "url", "No website specified."),
            ActionKind::ScreenRecording => self.recording(params),
            ActionKind::DictateToFile => {
                let seconds = number(params, &["seconds", "duration"], DEFAULT_DICTATION_SECS);
                self.host
                    .perform(action, &with(params, "seconds", &seconds.to_string()))
            }
            ActionKind::MonitorResources => {
                let threshold = number(params, &["threshold"], u64::from(DEFAULT_MONITOR_THRESHOLD));
                let seconds = number(params, &["seconds", "duration"], DEFAULT_MONITOR_SECS);
                let params = with(
                    &with(params, "threshold", &threshold.to_string()),
                    "seconds",
                    &seconds.to_string(),
                );
                self.host.perform(action, &params)
            }
            ActionKind::ScheduleTask => self.schedule(params),
            ActionKind::OpenFolder | ActionKind::OpenFile => self.open_path(action, params),
            ActionKind::CreateNote => self.create_note(params),
            ActionKind::ReadNote => self.read_note(params),
            ActionKind::ListNotes => self.list_notes(),
            ActionKind::DeleteNote => self.delete_note(params),
            ActionKind::CheckBattery
            | ActionKind::TakeScreenshot
            | ActionKind::MuteVolume
            | ActionKind::ShutdownPc
            | ActionKind::RestartPc
            | ActionKind::CancelShutdown
            | ActionKind::LockComputer
            | ActionKind::GetSystemInfo => self.host.perform(action, params),
        }
    }
}

/// Non-blank parameter value.
fn param<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// First parseable number among `keys`, else `default`.
fn number(params: &Params, keys: &[&str], default: u64) -> u64 {
    keys.iter()
        .find_map(|key| param(params, key).and_then(|v| v.parse().ok()))
        .unwrap_or(default)
}

fn with(params: &Params, key: &str, value: &str) -> Params {
    let mut params = params.clone();
    params.insert(key.to_owned(), value.to_owned());
    params
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
