//! Centralized application directory paths for hark.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Data (notes) | `~/Library/Application Support/hark/` | `~/.local/share/hark/` |
//! | Config | `~/Library/Application Support/hark/` | `~/.config/hark/` |
//!
//! # Environment Overrides
//!
//! - `HARK_DATA_DIR` overrides [`data_dir`]
//! - `HARK_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("HARK_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("hark"))
        .unwrap_or_else(|| PathBuf::from("/tmp/hark-data"))
}

/// Application config directory.
///
/// Holds `config.toml` and `commands.json`.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("HARK_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("hark"))
        .unwrap_or_else(|| PathBuf::from("/tmp/hark-config"))
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Persisted command table (`config_dir()/commands.json`).
#[must_use]
pub fn commands_file() -> PathBuf {
    config_dir().join("commands.json")
}

/// Default notes directory (`data_dir()/notes/`).
#[must_use]
pub fn notes_dir() -> PathBuf {
    data_dir().join("notes")
}

/// Folders searched by near-name folder/file lookup.
///
/// Missing platform directories are skipped.
#[must_use]
pub fn lookup_roots() -> Vec<PathBuf> {
    [
        dirs::home_dir(),
        dirs::desktop_dir(),
        dirs::document_dir(),
        dirs::download_dir(),
        dirs::picture_dir(),
    ]
    .into_iter()
    .flatten()
    .collect()
}
