//! Configuration types for the assistant core.
//!
//! [`AssistantConfig`] is the serialized form (TOML). [`SettingsStore`] is the
//! live, shared handle: it is read-mostly by the listening loops, and every
//! setter persists the whole document so no caller writes fields directly.

use crate::error::{Result, SpeechError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard};
use std::time::Duration;
use tracing::{info, warn};

/// Top-level configuration for the assistant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Wake phrase detection.
    pub wakeword: WakewordConfig,
    /// Listening loop timing.
    pub listening: ListeningConfig,
    /// Microphone capture settings.
    pub audio: AudioConfig,
    /// Speech-to-text engine selection.
    pub stt: SttConfig,
    /// Spoken response behaviour.
    pub response: ResponseConfig,
    /// Command resolver thresholds.
    pub resolver: ResolverConfig,
    /// Reminder scheduling.
    pub scheduler: SchedulerConfig,
    /// Command log and unrecognized-command tracking.
    pub history: HistoryConfig,
    /// Notes storage.
    pub notes: NotesConfig,
}

/// Wake phrase configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WakewordConfig {
    /// Whether wake phrase detection is enabled at all.
    pub enabled: bool,
    /// The activation phrase, compared case-insensitively.
    pub phrase: String,
    /// Minimum best-of-three similarity score (0-100) that counts as a hit.
    pub threshold: u8,
    /// Seconds the background loop stays suspended after a hit.
    pub cooldown_secs: u64,
}

impl Default for WakewordConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            phrase: "hey hark".to_owned(),
            threshold: 65,
            cooldown_secs: 10,
        }
    }
}

impl WakewordConfig {
    /// Cooldown window as a [`Duration`].
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Timeouts and retry intervals for the listening loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListeningConfig {
    /// Run the background wake loop at startup.
    pub background: bool,
    /// Background attempt: how long to wait for speech to start (ms).
    pub background_timeout_ms: u64,
    /// Background attempt: longest phrase captured (ms).
    pub background_phrase_limit_ms: u64,
    /// Active capture: how long to wait for speech to start (ms).
    pub active_timeout_ms: u64,
    /// Active capture: longest phrase captured (ms).
    pub active_phrase_limit_ms: u64,
    /// Sleep between background iterations (ms).
    pub idle_poll_ms: u64,
    /// Backoff after the microphone could not be opened (ms).
    pub device_retry_ms: u64,
    /// Backoff after a recognition service failure (ms).
    pub service_retry_ms: u64,
    /// Bounded join when stopping the background loop (ms).
    pub stop_join_timeout_ms: u64,
}

impl Default for ListeningConfig {
    fn default() -> Self {
        Self {
            background: true,
            background_timeout_ms: 1_000,
            background_phrase_limit_ms: 3_000,
            active_timeout_ms: 8_000,
            active_phrase_limit_ms: 10_000,
            idle_poll_ms: 100,
            device_retry_ms: 1_000,
            service_retry_ms: 5_000,
            stop_join_timeout_ms: 1_000,
        }
    }
}

impl ListeningConfig {
    /// Per-attempt listen window for the background loop.
    #[must_use]
    pub fn background_window(&self) -> ListenWindow {
        ListenWindow {
            timeout: Duration::from_millis(self.background_timeout_ms),
            phrase_limit: Duration::from_millis(self.background_phrase_limit_ms),
        }
    }

    /// Listen window for an active capture.
    #[must_use]
    pub fn active_window(&self) -> ListenWindow {
        ListenWindow {
            timeout: Duration::from_millis(self.active_timeout_ms),
            phrase_limit: Duration::from_millis(self.active_phrase_limit_ms),
        }
    }
}

/// How long a single listen call may wait and record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenWindow {
    /// Give up if speech has not started within this time.
    pub timeout: Duration,
    /// Stop recording after this much speech.
    pub phrase_limit: Duration,
}

/// Microphone capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device name (None = system default).
    pub input_device: Option<String>,
    /// Sample rate delivered to recognizers, in Hz.
    pub input_sample_rate: u32,
    /// Microphone sensitivity, 0-100. Higher picks up quieter speech.
    pub sensitivity: u8,
    /// Ambient noise calibration before each background attempt (ms).
    pub background_ambient_ms: u64,
    /// Ambient noise calibration before an active capture (ms).
    pub active_ambient_ms: u64,
    /// Trailing silence that ends a phrase (ms).
    pub pause_threshold_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            input_sample_rate: 16_000,
            sensitivity: 70,
            background_ambient_ms: 500,
            active_ambient_ms: 1_000,
            pause_threshold_ms: 800,
        }
    }
}

/// Which recognition engines to use, and in what order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechEngine {
    /// Network engine first, offline engine when it fails.
    #[default]
    OnlineFirst,
    /// Network engine only.
    OnlineOnly,
    /// Offline engine only.
    OfflineOnly,
}

/// Speech-to-text configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Engine selection policy.
    pub engine: SpeechEngine,
}

/// How the assistant talks back.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStyle {
    /// Spoken, informal.
    #[default]
    Casual,
    /// Spoken, formal.
    Formal,
    /// Never speak; responses are only published as events.
    Silent,
}

/// Response configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Response style.
    pub style: ResponseStyle,
}

/// Command resolver thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum fuzzy score for a trigger to be considered at all.
    pub fuzzy_cutoff: u8,
    /// Fuzzy matches scoring at or below this are answered with a hedge.
    pub hedge_ceiling: u8,
    /// How many top-scoring triggers the fuzzy pass keeps.
    pub fuzzy_candidates: usize,
    /// Shorter inputs are never resolved.
    pub min_input_chars: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fuzzy_cutoff: 60,
            hedge_ceiling: 75,
            fuzzy_candidates: 3,
            min_input_chars: 2,
        }
    }
}

/// Reminder scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Shortest reminder delay accepted from commands, in minutes.
    pub min_minutes: u64,
    /// Longest reminder delay accepted from commands, in minutes.
    pub max_minutes: u64,
    /// Delay used when a reminder command names no duration.
    pub default_minutes: u64,
    /// How many times a due reminder is spoken.
    pub announce_repeats: u32,
    /// Gap between repeated announcements (ms).
    pub announce_gap_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_minutes: 1,
            max_minutes: 60,
            default_minutes: 5,
            announce_repeats: 3,
            announce_gap_ms: 1_000,
        }
    }
}

impl SchedulerConfig {
    /// Clamp a requested delay to the accepted range.
    #[must_use]
    pub fn clamp_minutes(&self, minutes: u64) -> u64 {
        let min = self.min_minutes.max(1);
        minutes.clamp(min, self.max_minutes.max(min))
    }
}

/// Command log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Ring buffer capacity for the command log.
    pub limit: usize,
    /// Keep a list of commands the assistant could not resolve.
    pub save_unrecognized: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: 50,
            save_unrecognized: true,
        }
    }
}

/// Notes storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesConfig {
    /// Notes directory (None = `app_dirs::notes_dir()`).
    pub dir: Option<PathBuf>,
}

impl AssistantConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| SpeechError::Config(e.to_string()))
    }

    /// Load from `path` when it exists, defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// The file is written to a temporary sibling and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| SpeechError::Config(e.to_string()))?;
        write_atomic(path, &content)
    }
}

/// Write `content` to a temporary file next to `path` and rename it into place.
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_name = format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("hark"),
        std::process::id()
    );
    let tmp_path = path
        .parent()
        .map(|p| p.join(&tmp_name))
        .unwrap_or_else(|| PathBuf::from(&tmp_name));

    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Shared, persisted settings.
///
/// Readers take a snapshot via [`SettingsStore::read`] or [`SettingsStore::snapshot`].
/// Each setter validates, updates, and saves to disk (when a path is set).
/// A failed save keeps the in-memory change and returns the error.
pub struct SettingsStore {
    config: RwLock<AssistantConfig>,
    path: Option<PathBuf>,
}

impl SettingsStore {
    /// Wrap a config that is saved to `path` on every change.
    pub fn new(config: AssistantConfig, path: Option<PathBuf>) -> Self {
        Self {
            config: RwLock::new(config),
            path,
        }
    }

    /// In-memory store that never touches disk.
    pub fn in_memory(config: AssistantConfig) -> Self {
        Self::new(config, None)
    }

    /// Load the config at `path` (defaults when missing) and persist changes back to it.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be parsed.
    pub fn open(path: PathBuf) -> Result<Self> {
        let config = AssistantConfig::load_or_default(&path)?;
        info!("settings loaded from {}", path.display());
        Ok(Self::new(config, Some(path)))
    }

    /// Borrow the current configuration.
    pub fn read(&self) -> RwLockReadGuard<'_, AssistantConfig> {
        self.config.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Clone the current configuration.
    #[must_use]
    pub fn snapshot(&self) -> AssistantConfig {
        self.read().clone()
    }

    /// Current wake phrase, lowercased and trimmed.
    #[must_use]
    pub fn wake_phrase(&self) -> String {
        self.read().wakeword.phrase.trim().to_lowercase()
    }

    /// Change the wake phrase.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty phrase or when saving fails.
    pub fn set_wake_word(&self, phrase: &str) -> Result<()> {
        let phrase = phrase.trim();
        if phrase.is_empty() {
            return Err(SpeechError::Config("wake word cannot be empty".into()));
        }
        self.update(|c| c.wakeword.phrase = phrase.to_owned())?;
        info!("wake word changed to: {phrase}");
        Ok(())
    }

    /// Enable or disable wake phrase detection.
    ///
    /// # Errors
    ///
    /// Returns an error when saving fails.
    pub fn set_wakeword_enabled(&self, enabled: bool) -> Result<()> {
        self.update(|c| c.wakeword.enabled = enabled)
    }

    /// Enable or disable background listening.
    ///
    /// # Errors
    ///
    /// Returns an error when saving fails.
    pub fn set_background_listening(&self, enabled: bool) -> Result<()> {
        self.update(|c| c.listening.background = enabled)
    }

    /// Set microphone sensitivity (clamped to 0-100).
    ///
    /// # Errors
    ///
    /// Returns an error when saving fails.
    pub fn set_sensitivity(&self, sensitivity: u8) -> Result<()> {
        self.update(|c| c.audio.sensitivity = sensitivity.min(100))
    }

    /// Set the response style.
    ///
    /// # Errors
    ///
    /// Returns an error when saving fails.
    pub fn set_response_style(&self, style: ResponseStyle) -> Result<()> {
        self.update(|c| c.response.style = style)
    }

    /// Set the speech recognition engine policy.
    ///
    /// # Errors
    ///
    /// Returns an error when saving fails.
    pub fn set_speech_engine(&self, engine: SpeechEngine) -> Result<()> {
        self.update(|c| c.stt.engine = engine)?;
        info!("speech recognition engine changed to: {engine:?}");
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut AssistantConfig)) -> Result<()> {
        let snapshot = {
            let mut guard = self
                .config
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            apply(&mut guard);
            guard.clone()
        };
        if let Some(path) = &self.path {
            snapshot.save_to_file(path).inspect_err(|e| {
                warn!("cannot persist settings to {}: {e}", path.display());
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn defaults_match_assistant_behaviour() {
        let config = AssistantConfig::default();
        assert_eq!(config.wakeword.threshold, 65);
        assert_eq!(config.wakeword.cooldown(), Duration::from_secs(10));
        assert_eq!(config.resolver.fuzzy_cutoff, 60);
        assert_eq!(config.resolver.hedge_ceiling, 75);
        assert_eq!(config.resolver.fuzzy_candidates, 3);
        assert_eq!(config.history.limit, 50);
        assert_eq!(config.scheduler.announce_repeats, 3);
        assert_eq!(
            config.listening.active_window().timeout,
            Duration::from_secs(8)
        );
        assert_eq!(
            config.listening.background_window().phrase_limit,
            Duration::from_secs(3)
        );
    }

    #[test]
    fn clamp_minutes_stays_in_range() {
        let config = SchedulerConfig::default();
        assert_eq!(config.clamp_minutes(0), 1);
        assert_eq!(config.clamp_minutes(30), 30);
        assert_eq!(config.clamp_minutes(600), 60);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AssistantConfig::default();
        config.wakeword.phrase = "hello there".to_owned();
        config.audio.sensitivity = 40;
        config.response.style = ResponseStyle::Silent;
        config.stt.engine = SpeechEngine::OfflineOnly;

        config.save_to_file(&path).unwrap();
        let loaded = AssistantConfig::from_file(&path).unwrap();
        assert_eq!(loaded.wakeword.phrase, "hello there");
        assert_eq!(loaded.audio.sensitivity, 40);
        assert_eq!(loaded.response.style, ResponseStyle::Silent);
        assert_eq!(loaded.stt.engine, SpeechEngine::OfflineOnly);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[wakeword]\nphrase = \"computer\"\n").unwrap();

        let loaded = AssistantConfig::from_file(&path).unwrap();
        assert_eq!(loaded.wakeword.phrase, "computer");
        assert_eq!(loaded.wakeword.threshold, 65);
        assert_eq!(loaded.history.limit, 50);
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();
        assert!(AssistantConfig::from_file(&path).is_err());
    }

    #[test]
    fn setters_persist_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let store = SettingsStore::open(path.clone()).unwrap();

        store.set_wake_word("  Hey Computer ").unwrap();
        store.set_sensitivity(250).unwrap();
        store.set_response_style(ResponseStyle::Formal).unwrap();

        assert_eq!(store.wake_phrase(), "hey computer");
        let on_disk = AssistantConfig::from_file(&path).unwrap();
        assert_eq!(on_disk.wakeword.phrase, "Hey Computer");
        assert_eq!(on_disk.audio.sensitivity, 100);
        assert_eq!(on_disk.response.style, ResponseStyle::Formal);
    }

    #[test]
    fn empty_wake_word_is_rejected() {
        let store = SettingsStore::in_memory(AssistantConfig::default());
        assert!(store.set_wake_word("   ").is_err());
        assert_eq!(store.wake_phrase(), "hey hark");
    }
}
