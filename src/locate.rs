//! Near-name lookup of folders and files in the user's common directories.

use crate::similarity;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Minimum similarity for a candidate to be considered.
const CUTOFF: u8 = 80;
/// A candidate this close is accepted without looking further.
const ACCEPT_IMMEDIATELY: u8 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Folder,
    File,
}

/// Searches the immediate children of a fixed list of root directories.
#[derive(Debug, Clone)]
pub struct Locator {
    roots: Vec<PathBuf>,
}

impl Locator {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Locator over [`crate::app_dirs::lookup_roots`].
    #[must_use]
    pub fn from_home() -> Self {
        Self::new(crate::app_dirs::lookup_roots())
    }

    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Best-matching folder for `name`.
    #[must_use]
    pub fn find_folder(&self, name: &str) -> Option<PathBuf> {
        self.find(name, Kind::Folder)
    }

    /// Best-matching file for `name`. Names are compared with and without
    /// the extension.
    #[must_use]
    pub fn find_file(&self, name: &str) -> Option<PathBuf> {
        self.find(name, Kind::File)
    }

    fn find(&self, name: &str, kind: Kind) -> Option<PathBuf> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }

        let mut best: Option<(u8, PathBuf)> = None;
        for root in &self.roots {
            // Unreadable or missing roots are skipped.
            let Ok(entries) = std::fs::read_dir(root) else {
                continue;
            };
            for entry in entries.filter_map(|e| e.ok()) {
                let path = entry.path();
                let matches_kind = match kind {
                    Kind::Folder => path.is_dir(),
                    Kind::File => path.is_file(),
                };
                if !matches_kind {
                    continue;
                }
                let score = score_entry(&wanted, &path, kind);
                if score >= CUTOFF && best.as_ref().is_none_or(|(s, _)| score > *s) {
                    if score >= ACCEPT_IMMEDIATELY {
                        debug!(score, "near-name match: {}", path.display());
                        return Some(path);
                    }
                    best = Some((score, path));
                }
            }
        }
        if let Some((score, path)) = &best {
            debug!(score, "near-name match: {}", path.display());
        }
        best.map(|(_, path)| path)
    }
}

fn score_entry(wanted: &str, path: &Path, kind: Kind) -> u8 {
    let lower = |s: Option<&std::ffi::OsStr>| s.and_then(|s| s.to_str()).map(str::to_lowercase);
    let full = lower(path.file_name()).map_or(0, |n| similarity::ratio(wanted, &n));
    match kind {
        Kind::Folder => full,
        Kind::File => {
            let stem = lower(path.file_stem()).map_or(0, |n| similarity::ratio(wanted, &n));
            full.max(stem)
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn fixture() -> (tempfile::TempDir, Locator) {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("home");
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(home.join("Projects")).unwrap();
        std::fs::create_dir_all(home.join("Music")).unwrap();
        std::fs::create_dir_all(docs.join("Invoices 2024")).unwrap();
        std::fs::write(docs.join("budget.xlsx"), "").unwrap();
        std::fs::write(home.join("music.txt"), "").unwrap();
        let locator = Locator::new(vec![home, docs, dir.path().join("missing")]);
        (dir, locator)
    }

    #[test]
    fn finds_folder_case_insensitively() {
        let (_guard, locator) = fixture();
        let found = locator.find_folder("projects").unwrap();
        assert!(found.ends_with("Projects"));
    }

    #[test]
    fn near_miss_folder_is_accepted() {
        let (_guard, locator) = fixture();
        let found = locator.find_folder("invoices 2025").unwrap();
        assert!(found.ends_with("Invoices 2024"));
    }

    #[test]
    fn folder_lookup_ignores_files() {
        let (_guard, locator) = fixture();
        let found = locator.find_folder("music").unwrap();
        assert!(found.is_dir());
    }

    #[test]
    fn file_matches_without_extension() {
        let (_guard, locator) = fixture();
        let found = locator.find_file("budget").unwrap();
        assert!(found.ends_with("budget.xlsx"));
    }

    #[test]
    fn distant_names_are_rejected() {
        let (_guard, locator) = fixture();
        assert!(locator.find_folder("holiday photos").is_none());
        assert!(locator.find_file("").is_none());
    }
}
