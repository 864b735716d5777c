//! Pattern rules: the last resolution tier.
//!
//! Each rule is a cheap predicate over the normalized (lowercased) utterance
//! plus an extractor that pulls parameters out of it. Rules are tried in
//! order and the first predicate that holds wins, so broad rules such as
//! `web_search` sit below the narrower ones that could contain the same words.
//!
//! The parameter helpers ([`parse_reminder`], [`parse_note`],
//! [`duration_secs`]) are also used by the built-in actions so that a command
//! reached through the table (`"remind me ..."`) parses the same way as one
//! reached through a rule (`"set reminder ..."`).

use crate::voice_command::table::{ActionKind, Params};
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

/// A single pattern rule.
pub struct PatternRule {
    /// Stable rule name, reported in resolutions and logs.
    pub name: &'static str,
    /// Action the rule resolves to.
    pub action: ActionKind,
    predicate: fn(&str) -> bool,
    extract: fn(&str) -> Params,
}

impl PatternRule {
    /// Whether the rule applies to `text` (already normalized).
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        (self.predicate)(text)
    }

    /// Extract the rule's parameters from `text`.
    #[must_use]
    pub fn extract(&self, text: &str) -> Params {
        (self.extract)(text)
    }
}

impl std::fmt::Debug for PatternRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternRule")
            .field("name", &self.name)
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

/// The rule list, in priority order.
pub static RULES: &[PatternRule] = &[
    PatternRule {
        name: "time_query",
        action: ActionKind::SayTime,
        predicate: |t| t.contains("time") && t.contains("what"),
        extract: no_params,
    },
    PatternRule {
        name: "date_query",
        action: ActionKind::SayDay,
        predicate: |t| t.contains("date") && t.contains("what"),
        extract: no_params,
    },
    PatternRule {
        name: "encyclopedia",
        action: ActionKind::SearchWikipedia,
        predicate: |t| contains_any(t, &["who is", "what is"]),
        extract: |t| query_params(&strip_words(t, &ENCYCLOPEDIA_WORDS)),
    },
    PatternRule {
        name: "web_search",
        action: ActionKind::SearchWeb,
        predicate: |t| t.split_whitespace().any(|w| w == "search" || w == "google"),
        extract: |t| query_params(&strip_words(t, &SEARCH_WORDS)),
    },
    PatternRule {
        name: "open_website",
        action: ActionKind::OpenWebsite,
        predicate: |t| contains_any(t, &["open website", "go to"]),
        extract: website_params,
    },
    PatternRule {
        name: "lock_screen",
        action: ActionKind::LockComputer,
        predicate: |t| t.contains("lock") && contains_any(t, &["screen", "computer"]),
        extract: no_params,
    },
    PatternRule {
        name: "shutdown",
        action: ActionKind::ShutdownPc,
        predicate: |t| contains_any(t, &["shutdown computer", "turn off computer"]),
        extract: no_params,
    },
    PatternRule {
        name: "restart",
        action: ActionKind::RestartPc,
        predicate: |t| contains_any(t, &["restart computer", "reboot computer"]),
        extract: no_params,
    },
    PatternRule {
        name: "cancel_shutdown",
        action: ActionKind::CancelShutdown,
        predicate: |t| contains_any(t, &["cancel shutdown", "abort shutdown", "cancel restart"]),
        extract: no_params,
    },
    PatternRule {
        name: "reminder",
        action: ActionKind::ScheduleTask,
        predicate: |t| contains_any(t, &["remind me", "set reminder"]),
        extract: reminder_params,
    },
    PatternRule {
        name: "dictation",
        action: ActionKind::DictateToFile,
        predicate: |t| contains_any(t, &["dictate", "transcribe", "take notes"]),
        extract: |t| {
            let mut params = Params::new();
            let seconds = duration_secs(t).unwrap_or(DEFAULT_DICTATION_SECS);
            params.insert("seconds".into(), seconds.to_string());
            params
        },
    },
    PatternRule {
        name: "resource_monitor",
        action: ActionKind::MonitorResources,
        predicate: |t| {
            contains_any(t, &["monitor system", "monitor resources", "monitor computer"])
        },
        extract: monitor_params,
    },
    PatternRule {
        name: "create_note",
        action: ActionKind::CreateNote,
        predicate: |t| contains_any(t, &["create note", "make note", "take note"]),
        extract: |t| {
            let note = parse_note(t);
            let mut params = Params::new();
            if let Some(title) = note.title {
                params.insert("title".into(), title);
            }
            if let Some(content) = note.content {
                params.insert("content".into(), content);
            }
            params
        },
    },
    PatternRule {
        name: "read_note",
        action: ActionKind::ReadNote,
        predicate: |t| contains_any(t, &["read note", "show note", "open note"]),
        extract: |t| query_params(&strip_words(t, &READ_NOTE_WORDS)),
    },
    PatternRule {
        name: "list_notes",
        action: ActionKind::ListNotes,
        predicate: |t| contains_any(t, &["list notes", "show all notes", "what notes"]),
        extract: no_params,
    },
    PatternRule {
        name: "delete_note",
        action: ActionKind::DeleteNote,
        predicate: |t| contains_any(t, &["delete note", "remove note"]),
        extract: |t| query_params(&strip_words(t, &DELETE_NOTE_WORDS)),
    },
    PatternRule {
        name: "open_folder",
        action: ActionKind::OpenFolder,
        predicate: |t| contains_any(t, &["open folder", "open directory"]),
        extract: |t| query_params(&strip_words(t, &OPEN_FOLDER_WORDS)),
    },
];

/// First rule whose predicate holds for `text`, with its extracted parameters.
#[must_use]
pub fn match_rule(text: &str) -> Option<(&'static PatternRule, Params)> {
    RULES
        .iter()
        .find(|rule| rule.matches(text))
        .map(|rule| (rule, rule.extract(text)))
}

// ── Parameter helpers ──────────────────────────────────────────────────────

/// Dictation length when none is given.
pub const DEFAULT_DICTATION_SECS: u64 = 30;
/// Resource monitor alert threshold (percent) when none is given.
pub const DEFAULT_MONITOR_THRESHOLD: u8 = 90;
/// Resource monitor duration when none is given.
pub const DEFAULT_MONITOR_SECS: u64 = 60;

/// A reminder request parsed from an utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderRequest {
    /// What to be reminded about. May be empty.
    pub description: String,
    /// Requested delay, when the utterance named one.
    pub minutes: Option<u64>,
}

/// Parse `"remind me to call mom in 10 minutes"` style text.
///
/// The trigger words, the duration phrase, and a leading `to`/`about` are
/// removed from the description.
#[must_use]
pub fn parse_reminder(text: &str) -> ReminderRequest {
    let minutes = capture(&MINUTES_RE, text, 1).and_then(|n| n.parse().ok());
    let without_duration = replace(&REMINDER_DURATION_RE, text);
    let without_trigger = strip_words(&without_duration, &REMINDER_WORDS);
    let description = replace(&LEADING_CONNECTIVE_RE, &without_trigger)
        .trim()
        .to_owned();
    ReminderRequest {
        description,
        minutes,
    }
}

/// A note request parsed from an utterance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteRequest {
    /// From `title X` / `titled X`, or the first quoted phrase.
    pub title: Option<String>,
    /// From `content X` / `saying X` / `with X` / `that says X`.
    pub content: Option<String>,
}

/// Parse a note title and content out of free text.
#[must_use]
pub fn parse_note(text: &str) -> NoteRequest {
    let title = capture(&NOTE_TITLE_RE, text, 1)
        .or_else(|| {
            QUOTED_RE
                .as_ref()
                .and_then(|re| re.captures(text))
                .and_then(|c| c.get(1).or_else(|| c.get(2)))
                .map(|m| m.as_str().to_owned())
        })
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty());
    let content = capture(&NOTE_CONTENT_RE, text, 1)
        .map(|c| c.trim().to_owned())
        .filter(|c| !c.is_empty());
    NoteRequest { title, content }
}

/// First `N second(s)` / `N minute(s)` phrase in `text`, in seconds.
#[must_use]
pub fn duration_secs(text: &str) -> Option<u64> {
    let re = DURATION_RE.as_ref()?;
    let caps = re.captures(text)?;
    let value: u64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str();
    Some(if unit.starts_with("minute") {
        value.saturating_mul(60)
    } else {
        value
    })
}

fn no_params(_: &str) -> Params {
    Params::new()
}

fn query_params(query: &str) -> Params {
    let mut params = Params::new();
    let query = query.trim();
    if !query.is_empty() {
        params.insert("query".into(), query.to_owned());
    }
    params
}

fn website_params(text: &str) -> Params {
    let site = strip_words(text, &WEBSITE_WORDS);
    let mut params = Params::new();
    if site.is_empty() {
        return params;
    }
    let mut url = if site.starts_with("http") {
        site
    } else {
        format!("https://{site}")
    };
    if !url.rsplit('/').next().is_some_and(|last| last.contains('.')) {
        url.push_str(".com");
    }
    params.insert("url".into(), url);
    params
}

fn reminder_params(text: &str) -> Params {
    let request = parse_reminder(text);
    let mut params = query_params(&request.description);
    if let Some(minutes) = request.minutes {
        params.insert("minutes".into(), minutes.to_string());
    }
    params
}

fn monitor_params(text: &str) -> Params {
    let threshold = capture(&THRESHOLD_RE, text, 1)
        .and_then(|n| n.parse::<u8>().ok())
        .unwrap_or(DEFAULT_MONITOR_THRESHOLD);
    let seconds = capture(&MONITOR_FOR_RE, text, 0)
        .and_then(|phrase| duration_secs(&phrase))
        .unwrap_or(DEFAULT_MONITOR_SECS);

    let mut params = Params::new();
    params.insert("threshold".into(), threshold.to_string());
    params.insert("seconds".into(), seconds.to_string());
    params
}

fn contains_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| text.contains(p))
}

// ── Regexes ────────────────────────────────────────────────────────────────

type Pattern = LazyLock<Option<Regex>>;

fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(pattern)
        .inspect_err(|e| warn!("invalid built-in pattern {pattern:?}: {e}"))
        .ok()
}

static ENCYCLOPEDIA_WORDS: Pattern = LazyLock::new(|| compile(r"\b(?:who is|what is)\b"));
static SEARCH_WORDS: Pattern = LazyLock::new(|| compile(r"\b(?:search|google|for)\b"));
static WEBSITE_WORDS: Pattern = LazyLock::new(|| compile(r"\b(?:open website|go to)\b"));
static REMINDER_WORDS: Pattern = LazyLock::new(|| compile(r"\b(?:remind me|set reminder)\b"));
static READ_NOTE_WORDS: Pattern =
    LazyLock::new(|| compile(r"\b(?:read note|show note|open note|titled|called)\b"));
static DELETE_NOTE_WORDS: Pattern =
    LazyLock::new(|| compile(r"\b(?:delete note|remove note|titled|called)\b"));
static OPEN_FOLDER_WORDS: Pattern =
    LazyLock::new(|| compile(r"\b(?:open folder|open directory)\b"));

static MINUTES_RE: Pattern = LazyLock::new(|| compile(r"(\d+)\s*(?:minutes?|mins?)\b"));
static REMINDER_DURATION_RE: Pattern =
    LazyLock::new(|| compile(r"\b(?:in\s+|for\s+)?\d+\s*(?:minutes?|mins?)\b"));
static LEADING_CONNECTIVE_RE: Pattern = LazyLock::new(|| compile(r"^\s*(?:to|about)\b"));
static DURATION_RE: Pattern = LazyLock::new(|| compile(r"(\d+)\s*(seconds?|minutes?)\b"));
static THRESHOLD_RE: Pattern = LazyLock::new(|| compile(r"threshold (\d+)"));
static MONITOR_FOR_RE: Pattern =
    LazyLock::new(|| compile(r"for \d+ (?:seconds?|minutes?)\b"));
static NOTE_TITLE_RE: Pattern = LazyLock::new(|| {
    compile(r"\btitled?\s+(.+?)(?:\s+(?:content|saying|with|that says)\b|\s*$)")
});
static NOTE_CONTENT_RE: Pattern =
    LazyLock::new(|| compile(r"\b(?:content|saying|with|that says)\s+(.+)"));
static QUOTED_RE: Pattern = LazyLock::new(|| compile(r#""([^"]+)"|'([^']+)'"#));

fn capture(re: &Pattern, text: &str, group: usize) -> Option<String> {
    re.as_ref()?
        .captures(text)?
        .get(group)
        .map(|m| m.as_str().to_owned())
}

fn replace(re: &Pattern, text: &str) -> String {
    match re.as_ref() {
        Some(re) => re.replace_all(text, " ").into_owned(),
        None => text.to_owned(),
    }
}

/// Remove every match of `re` and collapse the leftover whitespace.
fn strip_words(text: &str, re: &Pattern) -> String {
    replace(re, text).split_whitespace().collect::<Vec<_>>().join(" ")
}
