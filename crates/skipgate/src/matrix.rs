//! The table of historical versions to exercise.

use skipgate_types::{Release, VersionSpec};
use std::collections::HashSet;
use thiserror::Error;

/// Releases older than last-lts, each with the collection it populates.
const BUILTIN: [(Release, &str); 3] = [
    (Release::new(3, 6), "three_six"),
    (Release::new(4, 0), "four_zero"),
    (Release::new(4, 2), "four_two"),
];

/// Problems with a configured matrix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatrixError {
    #[error("Matrix entry {release} is not older than last-lts {last_lts}")]
    NotSkipLevel { release: Release, last_lts: Release },

    #[error("Matrix entry {0} has an empty collection name")]
    EmptyCollection(Release),

    #[error("Matrix collection name '{0}' is used more than once")]
    DuplicateCollection(String),
}

/// Ordered, restartable list of [`VersionSpec`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMatrix {
    entries: Vec<VersionSpec>,
}

impl VersionMatrix {
    /// 3.6, 4.0 and 4.2.
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN
                .iter()
                .map(|(release, collection)| VersionSpec::new(*release, *collection))
                .collect(),
        }
    }

    pub fn from_entries(entries: Vec<VersionSpec>) -> Self {
        Self { entries }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VersionSpec> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keeps only the entries for `releases`, preserving matrix order.
    pub fn only(&self, releases: &[Release]) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|spec| releases.contains(&spec.binary_version))
                .cloned()
                .collect(),
        }
    }

    /// Every entry must be strictly older than `last_lts` and own a distinct collection.
    pub fn check_against(&self, last_lts: Release) -> Result<(), MatrixError> {
        let mut seen = HashSet::new();

        for spec in &self.entries {
            if spec.binary_version >= last_lts {
                return Err(MatrixError::NotSkipLevel {
                    release: spec.binary_version,
                    last_lts,
                });
            }
            if spec.test_collection.trim().is_empty() {
                return Err(MatrixError::EmptyCollection(spec.binary_version));
            }
            if !seen.insert(spec.test_collection.as_str()) {
                return Err(MatrixError::DuplicateCollection(
                    spec.test_collection.clone(),
                ));
            }
        }

        Ok(())
    }
}

impl Default for VersionMatrix {
    fn default() -> Self {
        Self::builtin()
    }
}

impl<'a> IntoIterator for &'a VersionMatrix {
    type Item = &'a VersionSpec;
    type IntoIter = std::slice::Iter<'a, VersionSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order() {
        let matrix = VersionMatrix::builtin();
        let names: Vec<&str> = matrix.iter().map(|s| s.test_collection.as_str()).collect();
        assert_eq!(names, ["three_six", "four_zero", "four_two"]);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let matrix = VersionMatrix::builtin();
        let first: Vec<_> = matrix.iter().cloned().collect();
        let second: Vec<_> = (&matrix).into_iter().cloned().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_builtin_is_skip_level_for_default_lts() {
        assert!(
            VersionMatrix::builtin()
                .check_against(Release::new(4, 4))
                .is_ok()
        );
    }

    #[test]
    fn test_entry_at_last_lts_is_rejected() {
        let err = VersionMatrix::builtin()
            .check_against(Release::new(4, 2))
            .unwrap_err();
        assert_eq!(
            err,
            MatrixError::NotSkipLevel {
                release: Release::new(4, 2),
                last_lts: Release::new(4, 2),
            }
        );
    }

    #[test]
    fn test_duplicate_collection_is_rejected() {
        let matrix = VersionMatrix::from_entries(vec![
            VersionSpec::new(Release::new(3, 6), "same"),
            VersionSpec::new(Release::new(4, 0), "same"),
        ]);
        assert_eq!(
            matrix.check_against(Release::new(4, 4)),
            Err(MatrixError::DuplicateCollection("same".into()))
        );
    }

    #[test]
    fn test_empty_collection_is_rejected() {
        let matrix =
            VersionMatrix::from_entries(vec![VersionSpec::new(Release::new(3, 6), " ")]);
        assert!(matches!(
            matrix.check_against(Release::new(4, 4)),
            Err(MatrixError::EmptyCollection(_))
        ));
    }

    #[test]
    fn test_only_filters_in_matrix_order() {
        let matrix = VersionMatrix::builtin().only(&[Release::new(4, 2), Release::new(3, 6)]);
        let releases: Vec<Release> = matrix.iter().map(|s| s.binary_version).collect();
        assert_eq!(releases, [Release::new(3, 6), Release::new(4, 2)]);
    }
}
