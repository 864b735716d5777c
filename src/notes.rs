//! Plain-text notes.
//!
//! Each note is `<sanitized title>.txt` in the notes directory, starting with
//! a `Title:` / `Date:` header. Reads and deletes first try the exact file
//! name and then fall back to the closest existing note name.

use crate::config::write_atomic;
use crate::error::{Result, SpeechError};
use crate::similarity;
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Minimum similarity for a fuzzy note-name match.
const FUZZY_CUTOFF: u8 = 70;
const EXTENSION: &str = "txt";

/// A note loaded from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    /// File stem of the note.
    pub name: String,
    /// Full file content, including the header.
    pub content: String,
}

/// Notes directory manager.
#[derive(Debug, Clone)]
pub struct NotesStore {
    dir: PathBuf,
}

impl NotesStore {
    /// Open (creating if needed) the notes directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .map_err(|e| SpeechError::Notes(format!("cannot create {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create (or overwrite) a note. A missing or unusable title gets a
    /// timestamped one. Returns the title used.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn create(&self, title: Option<&str>, content: &str) -> Result<String> {
        let now = Local::now();
        let title = title
            .map(str::trim)
            .filter(|t| !sanitize_title(t).is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| format!("Note_{}", now.format("%Y%m%d_%H%M%S")));

        let path = self.path_for(&sanitize_title(&title));
        let body = format!(
            "Title: {title}\nDate: {}\n\n{content}",
            now.format("%Y-%m-%d %H:%M:%S")
        );
        write_atomic(&path, &body)
            .map_err(|e| SpeechError::Notes(format!("cannot write note: {e}")))?;
        info!("note created: {}", path.display());
        Ok(title)
    }

    /// Read a note by title.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or the note cannot be read.
    pub fn read(&self, title: &str) -> Result<Option<Note>> {
        let Some(name) = self.find(title)? else {
            return Ok(None);
        };
        let content = std::fs::read_to_string(self.path_for(&name))
            .map_err(|e| SpeechError::Notes(format!("cannot read note {name}: {e}")))?;
        Ok(Some(Note { name, content }))
    }

    /// Note titles (underscores shown as spaces), sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn list(&self) -> Result<Vec<String>> {
        Ok(self
            .stems()?
            .into_iter()
            .map(|stem| stem.replace('_', " "))
            .collect())
    }

    /// Delete a note by title. Returns the deleted note's name.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read or the file cannot be removed.
    pub fn delete(&self, title: &str) -> Result<Option<String>> {
        let Some(name) = self.find(title)? else {
            return Ok(None);
        };
        std::fs::remove_file(self.path_for(&name))
            .map_err(|e| SpeechError::Notes(format!("cannot delete note {name}: {e}")))?;
        info!("note deleted: {name}");
        Ok(Some(name))
    }

    /// Exact sanitized name, else closest existing name.
    fn find(&self, title: &str) -> Result<Option<String>> {
        let wanted = sanitize_title(title);
        if wanted.is_empty() {
            return Ok(None);
        }
        if self.path_for(&wanted).is_file() {
            return Ok(Some(wanted));
        }

        let stems = self.stems()?;
        let found = similarity::best_match(&wanted, stems.iter().map(String::as_str), FUZZY_CUTOFF)
            .map(|m| m.candidate.to_owned());
        debug!(wanted = %wanted, found = ?found, "fuzzy note lookup");
        Ok(found)
    }

    fn stems(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| SpeechError::Notes(format!("cannot list {}: {e}", self.dir.display())))?;
        let mut stems: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == EXTENSION))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_owned))
            .collect();
        stems.sort();
        Ok(stems)
    }

    fn path_for(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}.{EXTENSION}"))
    }
}

/// File-name form of a title: word characters, whitespace and `-` are kept,
/// then spaces become underscores.
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    kept.trim().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn store() -> (tempfile::TempDir, NotesStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = NotesStore::open(dir.path().join("notes")).unwrap();
        (dir, store)
    }

    #[test]
    fn sanitize_strips_punctuation() {
        assert_eq!(sanitize_title(" Shopping list! (v2) "), "Shopping_list_v2");
        assert_eq!(sanitize_title("a-b_c"), "a-b_c");
        assert_eq!(sanitize_title("?!"), "");
    }

    #[test]
    fn create_writes_header_and_content() {
        let (_guard, store) = store();
        let title = store.create(Some("Shopping list"), "milk").unwrap();
        assert_eq!(title, "Shopping list");

        let content = std::fs::read_to_string(store.dir().join("Shopping_list.txt")).unwrap();
        assert!(content.starts_with("Title: Shopping list\nDate: "));
        assert!(content.ends_with("\n\nmilk"));
    }

    #[test]
    fn untitled_note_gets_timestamp_title() {
        let (_guard, store) = store();
        let title = store.create(None, "x").unwrap();
        assert!(title.starts_with("Note_"));
        let title = store.create(Some("!!!"), "y").unwrap();
        assert!(title.starts_with("Note_"));
    }

    #[test]
    fn read_falls_back_to_fuzzy_name() {
        let (_guard, store) = store();
        store.create(Some("shopping list"), "eggs").unwrap();

        let exact = store.read("shopping list").unwrap().unwrap();
        assert_eq!(exact.name, "shopping_list");

        let fuzzy = store.read("shoping lists").unwrap().unwrap();
        assert_eq!(fuzzy.name, "shopping_list");
        assert!(fuzzy.content.ends_with("eggs"));

        assert!(store.read("tax return").unwrap().is_none());
    }

    #[test]
    fn list_and_delete() {
        let (_guard, store) = store();
        store.create(Some("beta note"), "b").unwrap();
        store.create(Some("alpha"), "a").unwrap();
        std::fs::write(store.dir().join("ignored.md"), "x").unwrap();

        assert_eq!(store.list().unwrap(), ["alpha", "beta note"]);
        assert_eq!(store.delete("beta nte").unwrap().as_deref(), Some("beta_note"));
        assert_eq!(store.list().unwrap(), ["alpha"]);
        assert!(store.delete("gamma").unwrap().is_none());
    }
}
