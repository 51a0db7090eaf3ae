//! The single on-disk data directory shared by every protocol step.

use skipgate_types::VersionSpec;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Data directory owned by at most one [`VersionSpec`] at a time.
///
/// Ownership is claimed by a successful populate and released by [`reset`](Self::reset).
#[derive(Debug)]
pub struct DataDirectory {
    path: PathBuf,
    owner: Option<VersionSpec>,
}

impl DataDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            owner: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn owner(&self) -> Option<&VersionSpec> {
        self.owner.as_ref()
    }

    /// Empties the directory, creating it if needed, and releases ownership.
    pub fn reset(&mut self) -> io::Result<()> {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        fs::create_dir_all(&self.path)?;

        if let Some(previous) = self.owner.take() {
            debug!(path = %self.path.display(), %previous, "data directory reset");
        }
        Ok(())
    }

    /// True when the directory exists, holds no files and has no owner.
    pub fn is_clean(&self) -> io::Result<bool> {
        if self.owner.is_some() {
            return Ok(false);
        }
        match fs::read_dir(&self.path) {
            Ok(mut entries) => Ok(entries.next().is_none()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub(crate) fn claim(&mut self, spec: &VersionSpec) {
        self.owner = Some(spec.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skipgate_types::Release;
    use tempfile::tempdir;

    #[test]
    fn test_reset_creates_missing_directory() {
        let temp = tempdir().expect("Failed to create temp dir");
        let mut dir = DataDirectory::new(temp.path().join("nested/skip_level_upgrade"));

        dir.reset().expect("reset");

        assert!(dir.path().is_dir());
        assert!(dir.is_clean().expect("is_clean"));
    }

    #[test]
    fn test_reset_removes_files_and_owner() {
        let temp = tempdir().expect("Failed to create temp dir");
        let mut dir = DataDirectory::new(temp.path().join("db"));
        dir.reset().expect("reset");

        fs::create_dir_all(dir.path().join("journal")).expect("mkdir");
        fs::write(dir.path().join("journal/file"), b"x").expect("write");
        dir.claim(&VersionSpec::new(Release::new(4, 0), "four_zero"));
        assert!(!dir.is_clean().expect("is_clean"));

        dir.reset().expect("reset");

        assert!(dir.owner().is_none());
        assert!(dir.is_clean().expect("is_clean"));
    }

    #[test]
    fn test_missing_directory_is_not_clean() {
        let temp = tempdir().expect("Failed to create temp dir");
        let dir = DataDirectory::new(temp.path().join("absent"));
        assert!(!dir.is_clean().expect("is_clean"));
    }
}
