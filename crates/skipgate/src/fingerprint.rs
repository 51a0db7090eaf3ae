//! Content fingerprints of a data directory.
//!
//! A fingerprint is taken after populate and again after the rejected
//! skip-level start and repair. Any file that appears, disappears or changes
//! between the two is reported. Lock files and logs churn on every start and
//! are left out through the exclusion list.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

/// SHA-256 of every file under a directory, keyed by `/`-separated relative path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fingerprint {
    files: BTreeMap<String, String>,
}

/// A difference between two fingerprints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Added(String),
    Removed(String),
    Modified(String),
}

impl fmt::Display for FileChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added(path) => write!(f, "+{path}"),
            Self::Removed(path) => write!(f, "-{path}"),
            Self::Modified(path) => write!(f, "~{path}"),
        }
    }
}

impl Fingerprint {
    /// Hashes every file under `root` whose path has no component matching `exclude`.
    ///
    /// Patterns are exact names (`mongod.lock`, `diagnostic.data`) or `*.ext` suffixes.
    pub fn capture(root: &Path, exclude: &[String]) -> io::Result<Self> {
        let mut files = BTreeMap::new();
        walk(root, "", exclude, &mut files)?;
        Ok(Self { files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Digest over all paths and file hashes.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (path, hash) in &self.files {
            hasher.update(path.as_bytes());
            hasher.update([0]);
            hasher.update(hash.as_bytes());
            hasher.update([b'\n']);
        }
        hex(&hasher.finalize())
    }

    /// Changes from `self` to `later`, ordered by path.
    pub fn diff(&self, later: &Fingerprint) -> Vec<FileChange> {
        let mut changes = Vec::new();

        for (path, hash) in &self.files {
            match later.files.get(path) {
                None => changes.push(FileChange::Removed(path.clone())),
                Some(other) if other != hash => changes.push(FileChange::Modified(path.clone())),
                Some(_) => {}
            }
        }
        for path in later.files.keys() {
            if !self.files.contains_key(path) {
                changes.push(FileChange::Added(path.clone()));
            }
        }

        changes.sort_by(|a, b| change_path(a).cmp(change_path(b)));
        changes
    }
}

fn change_path(change: &FileChange) -> &str {
    match change {
        FileChange::Added(p) | FileChange::Removed(p) | FileChange::Modified(p) => p,
    }
}

fn is_excluded(name: &str, exclude: &[String]) -> bool {
    exclude.iter().any(|pattern| match pattern.strip_prefix('*') {
        Some(suffix) => name.ends_with(suffix),
        None => name == pattern,
    })
}

fn walk(
    dir: &Path,
    prefix: &str,
    exclude: &[String],
    files: &mut BTreeMap<String, String>,
) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_excluded(&name, exclude) {
            continue;
        }

        let relative = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk(&entry.path(), &relative, exclude, files)?;
        } else if file_type.is_file() {
            let contents = fs::read(entry.path())?;
            files.insert(relative, hex(&Sha256::digest(&contents)));
        }
    }
    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
