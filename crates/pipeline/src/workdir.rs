//! Per-run scratch directory for the converted PDF and slide images.

use deck_core::Result;
use std::path::{Path, PathBuf};

/// Scratch directory `<deck-stem>_debug/` next to the deck.
///
/// Removed on drop unless it is being kept for debugging.
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
    keep: bool,
}

impl WorkDir {
    /// Create the work directory for `deck`.
    ///
    /// A directory left behind by an earlier debug run is emptied first so
    /// its slide images cannot be mistaken for this run's.
    pub fn create(deck: &Path, keep: bool) -> Result<Self> {
        let stem = deck
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("deck");
        let parent = match deck.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let path = parent.join(format!("{}_debug", stem));
        if path.exists() {
            log::info!("Clearing previous work directory: {}", path.display());
            std::fs::remove_dir_all(&path)?;
        }
        std::fs::create_dir_all(&path)?;
        log::info!("Created temp directory: {}", path.display());

        Ok(Self { path, keep })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if self.keep {
            log::info!("Debug mode: Keeping temp files in {}", self.path.display());
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => log::info!("Cleaned up temp directory: {}", self.path.display()),
            Err(e) => log::warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let deck = dir.path().join("review.pptx");

        let path = {
            let workdir = WorkDir::create(&deck, false).unwrap();
            assert_eq!(workdir.path(), dir.path().join("review_debug"));
            std::fs::write(workdir.path().join("slide-1.jpg"), b"jpeg").unwrap();
            workdir.path().to_path_buf()
        };

        assert!(!path.exists());
    }

    #[test]
    fn test_stale_files_cleared_on_create() {
        let dir = tempfile::tempdir().unwrap();
        let deck = dir.path().join("review.pptx");
        let stale = dir.path().join("review_debug");
        std::fs::create_dir_all(&stale).unwrap();
        for name in ["slide-01.jpg", "slide-02.jpg", "slide-10.jpg", "review.pdf"] {
            std::fs::write(stale.join(name), b"old").unwrap();
        }

        let workdir = WorkDir::create(&deck, true).unwrap();
        assert_eq!(workdir.path(), stale);
        assert_eq!(std::fs::read_dir(workdir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_kept_in_debug_mode() {
        let dir = tempfile::tempdir().unwrap();
        let deck = dir.path().join("review.pptx");

        let path = WorkDir::create(&deck, true).unwrap().path().to_path_buf();
        assert!(path.is_dir());
    }
}
