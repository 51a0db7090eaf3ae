//! Maps version selectors to installed binaries.

use crate::{Error, Result};
use skipgate_types::{BinaryVersion, Release};
use std::path::{Path, PathBuf};

/// Resolves [`BinaryVersion`] selectors to executable paths.
///
/// Historical releases live side by side in one directory using the
/// `<binary>-<major>.<minor>` naming the multiversion installer produces.
#[derive(Debug, Clone)]
pub struct BinaryResolver {
    /// Binary under test. A bare name is looked up on `PATH` at spawn time.
    pub latest: PathBuf,

    /// Directory holding historical binaries.
    pub multiversion_dir: PathBuf,

    /// Base binary name, e.g. `mongod`.
    pub binary_name: String,

    /// Release that `last-lts` refers to.
    pub last_lts: Release,
}

impl BinaryResolver {
    pub fn new(
        latest: impl Into<PathBuf>,
        multiversion_dir: impl Into<PathBuf>,
        binary_name: impl Into<String>,
        last_lts: Release,
    ) -> Self {
        Self {
            latest: latest.into(),
            multiversion_dir: multiversion_dir.into(),
            binary_name: binary_name.into(),
            last_lts,
        }
    }

    /// Path of the installed binary for a historical release.
    pub fn release_path(&self, release: Release) -> PathBuf {
        self.multiversion_dir
            .join(format!("{}-{release}", self.binary_name))
    }

    /// Resolves `version` to a binary, checking that installed paths exist.
    pub fn resolve(&self, version: BinaryVersion) -> Result<PathBuf> {
        let path = match version {
            BinaryVersion::Latest => {
                if is_bare_name(&self.latest) {
                    return Ok(self.latest.clone());
                }
                self.latest.clone()
            }
            BinaryVersion::LastLts => self.release_path(self.last_lts),
            BinaryVersion::Release(release) => self.release_path(release),
        };

        if !path.exists() {
            return Err(Error::BinaryNotFound { version, path });
        }

        Ok(path)
    }
}

fn is_bare_name(path: &Path) -> bool {
    path.components().count() == 1 && !path.is_absolute()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn resolver(dir: &Path) -> BinaryResolver {
        BinaryResolver::new("mongod", dir, "mongod", Release::new(4, 4))
    }

    #[test]
    fn test_release_path_naming() {
        let r = resolver(Path::new("/opt/multiversion"));
        assert_eq!(
            r.release_path(Release::new(4, 0)),
            PathBuf::from("/opt/multiversion/mongod-4.0")
        );
    }

    #[test]
    fn test_latest_bare_name_is_not_checked() {
        let temp = TempDir::new().unwrap();
        let r = resolver(temp.path());
        assert_eq!(
            r.resolve(BinaryVersion::Latest).unwrap(),
            PathBuf::from("mongod")
        );
    }

    #[test]
    fn test_missing_release_is_binary_not_found() {
        let temp = TempDir::new().unwrap();
        let r = resolver(temp.path());

        let err = r
            .resolve(BinaryVersion::Release(Release::new(3, 6)))
            .unwrap_err();
        assert!(matches!(err, Error::BinaryNotFound { .. }));
    }

    #[test]
    fn test_installed_release_and_last_lts() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("mongod-4.2"), b"").unwrap();
        fs::write(temp.path().join("mongod-4.4"), b"").unwrap();
        let r = resolver(temp.path());

        assert_eq!(
            r.resolve(BinaryVersion::Release(Release::new(4, 2))).unwrap(),
            temp.path().join("mongod-4.2")
        );
        assert_eq!(
            r.resolve(BinaryVersion::LastLts).unwrap(),
            temp.path().join("mongod-4.4")
        );
    }

    #[test]
    fn test_latest_absolute_path_must_exist() {
        let temp = TempDir::new().unwrap();
        let mut r = resolver(temp.path());
        r.latest = temp.path().join("bin").join("mongod");

        assert!(matches!(
            r.resolve(BinaryVersion::Latest),
            Err(Error::BinaryNotFound { .. })
        ));
    }
}
