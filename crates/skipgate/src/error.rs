//! Error types for the upgrade-refusal protocol.

use skipgate_client::KeyPattern;
use skipgate_types::{Endpoint, Step, VersionSpec};
use std::fmt;
use thiserror::Error;

/// A protocol failure. Every variant names the version and step it hit.
#[derive(Error, Debug)]
pub enum Error {
    /// A step that had to succeed for the test to be meaningful failed.
    #[error("Environment fault for {spec} during {step}: {reason}")]
    EnvironmentFault {
        spec: VersionSpec,
        step: Step,
        reason: String,
    },

    /// The latest binary opened data from a release older than last-lts.
    #[error("Skip-level start of latest over data from {spec} succeeded at {endpoint}")]
    UpgradeSafetyViolation { spec: VersionSpec, endpoint: Endpoint },

    /// Repair with the latest binary exited 0 on skip-level data.
    #[error("Repair with latest over data from {spec} exited {exit_code}, expected failure")]
    RepairSafetyViolation { spec: VersionSpec, exit_code: i32 },

    /// Data written by the original release is no longer intact.
    #[error("Corruption detected for {spec} during {step}: {detail}")]
    CorruptionDetected {
        spec: VersionSpec,
        step: Step,
        detail: Corruption,
    },
}

impl Error {
    pub(crate) fn environment(spec: &VersionSpec, step: Step, reason: impl fmt::Display) -> Self {
        Self::EnvironmentFault {
            spec: spec.clone(),
            step,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn corruption(spec: &VersionSpec, step: Step, detail: Corruption) -> Self {
        Self::CorruptionDetected {
            spec: spec.clone(),
            step,
            detail,
        }
    }

    /// The matrix entry being exercised.
    pub fn spec(&self) -> &VersionSpec {
        match self {
            Self::EnvironmentFault { spec, .. }
            | Self::UpgradeSafetyViolation { spec, .. }
            | Self::RepairSafetyViolation { spec, .. }
            | Self::CorruptionDetected { spec, .. } => spec,
        }
    }

    /// The step that failed.
    pub fn step(&self) -> Step {
        match self {
            Self::EnvironmentFault { step, .. } | Self::CorruptionDetected { step, .. } => *step,
            Self::UpgradeSafetyViolation { .. } => Step::SkipUpgradeStart,
            Self::RepairSafetyViolation { .. } => Step::Repair,
        }
    }

    /// Short name of the failure class.
    pub fn class(&self) -> &'static str {
        match self {
            Self::EnvironmentFault { .. } => "environment-fault",
            Self::UpgradeSafetyViolation { .. } => "upgrade-safety-violation",
            Self::RepairSafetyViolation { .. } => "repair-safety-violation",
            Self::CorruptionDetected { .. } => "corruption-detected",
        }
    }

    /// True for failures of the store under test rather than of the harness.
    pub fn is_violation(&self) -> bool {
        !matches!(self, Self::EnvironmentFault { .. })
    }
}

/// What was found damaged.
#[derive(Debug, Clone, PartialEq)]
pub enum Corruption {
    /// The original release refused to start on its own data.
    RollbackRejected,

    /// Document count differs from what populate wrote.
    DocumentCount { expected: u64, found: u64 },

    /// No index with the populated key pattern.
    IndexMissing {
        pattern: KeyPattern,
        present: Vec<KeyPattern>,
    },

    /// An integrity query was rejected.
    QueryFailed(String),

    /// Files changed across the rejected attempts.
    FingerprintChanged { changed: Vec<String> },
}

impl fmt::Display for Corruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RollbackRejected => {
                write!(f, "original version failed to start on its own data directory")
            }
            Self::DocumentCount { expected, found } => {
                write!(f, "expected {expected} document(s), found {found}")
            }
            Self::IndexMissing { pattern, present } => {
                let present: Vec<String> = present.iter().map(ToString::to_string).collect();
                write!(
                    f,
                    "index {pattern} missing (present: [{}])",
                    present.join(", ")
                )
            }
            Self::QueryFailed(reason) => write!(f, "integrity query failed: {reason}"),
            Self::FingerprintChanged { changed } => {
                write!(f, "data files changed: {}", changed.join(", "))
            }
        }
    }
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;
