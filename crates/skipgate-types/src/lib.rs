//! # skipgate-types: Core types for `skipgate`
//!
//! Shared vocabulary for the upgrade-refusal protocol:
//! - Release identifiers ([`Release`], [`BinaryVersion`])
//! - Matrix entries ([`VersionSpec`])
//! - Live process addresses ([`Endpoint`])
//! - Protocol steps and expectations ([`Step`], [`Outcome`], [`Expectation`])
//! - Data directory drift policy ([`FingerprintMode`])

use std::{
    fmt::{self, Display},
    net::{IpAddr, Ipv4Addr, SocketAddr},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Release identifiers - Copy (two small integers)
// ============================================================================

/// A `major.minor` release of the store binary.
///
/// Ordering is numeric on `(major, minor)`, so `4.10 > 4.2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Release {
    pub major: u32,
    pub minor: u32,
}

impl Release {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Error returned when a release or version selector cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version '{input}': expected 'latest', 'last-lts' or MAJOR.MINOR")]
pub struct ParseVersionError {
    pub input: String,
}

impl FromStr for Release {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseVersionError {
            input: s.to_string(),
        };

        let (major, minor) = s.trim().split_once('.').ok_or_else(err)?;
        let major = major.parse().map_err(|_| err())?;
        let minor = minor.parse().map_err(|_| err())?;

        Ok(Self { major, minor })
    }
}

impl Serialize for Release {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Release {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Selects which binary a node is launched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryVersion {
    /// The binary under test (the current build).
    Latest,
    /// The most recent long-term-supported release.
    LastLts,
    /// A specific historical release.
    Release(Release),
}

impl Display for BinaryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::LastLts => write!(f, "last-lts"),
            Self::Release(release) => write!(f, "{release}"),
        }
    }
}

impl FromStr for BinaryVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "latest" => Ok(Self::Latest),
            "last-lts" => Ok(Self::LastLts),
            other => other.parse().map(Self::Release),
        }
    }
}

impl From<Release> for BinaryVersion {
    fn from(release: Release) -> Self {
        Self::Release(release)
    }
}

// ============================================================================
// Matrix entries - Clone (owns the collection name)
// ============================================================================

/// One historical version to exercise, and the collection it writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionSpec {
    pub binary_version: Release,
    pub test_collection: String,
}

impl VersionSpec {
    pub fn new(binary_version: Release, test_collection: impl Into<String>) -> Self {
        Self {
            binary_version,
            test_collection: test_collection.into(),
        }
    }
}

impl Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.binary_version, self.test_collection)
    }
}

// ============================================================================
// Endpoints - Copy
// ============================================================================

/// Network address of a live store process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint(SocketAddr);

impl Endpoint {
    pub fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    /// Loopback endpoint on the given port.
    pub fn localhost(port: u16) -> Self {
        Self(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port))
    }

    pub fn addr(self) -> SocketAddr {
        self.0
    }

    pub fn ip(self) -> IpAddr {
        self.0.ip()
    }

    pub fn port(self) -> u16 {
        self.0.port()
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Protocol steps
// ============================================================================

/// A step of the upgrade-refusal protocol, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    /// Populate the directory with the historical binary.
    Populate,
    /// Start the latest binary over the historical data.
    SkipUpgradeStart,
    /// Run repair with the latest binary.
    Repair,
    /// Restart the historical binary.
    Rollback,
    /// Check the data written during populate.
    Verify,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::Populate,
        Step::SkipUpgradeStart,
        Step::Repair,
        Step::Rollback,
        Step::Verify,
    ];
}

impl Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Populate => "populate",
            Self::SkipUpgradeStart => "skip-upgrade-start",
            Self::Repair => "repair",
            Self::Rollback => "rollback",
            Self::Verify => "verify",
        };
        f.write_str(name)
    }
}

/// Whether an attempt succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Success,
    Failure,
}

impl Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// Expected outcome of one protocol step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectation {
    pub step: Step,
    pub expected: Outcome,
}

impl Expectation {
    pub const fn new(step: Step, expected: Outcome) -> Self {
        Self { step, expected }
    }

    /// Returns true when `observed` is what this step requires.
    pub fn is_met_by(self, observed: Outcome) -> bool {
        self.expected == observed
    }
}

/// The expectations that carry the safety property under test.
pub const EXPECTATIONS: [Expectation; 3] = [
    Expectation::new(Step::SkipUpgradeStart, Outcome::Failure),
    Expectation::new(Step::Repair, Outcome::Failure),
    Expectation::new(Step::Rollback, Outcome::Success),
];

/// Looks up the expectation for a step, if the step carries one.
pub fn expectation_for(step: Step) -> Option<Expectation> {
    EXPECTATIONS.iter().copied().find(|e| e.step == step)
}

// ============================================================================
// Fingerprinting - Copy
// ============================================================================

/// What to do when the data directory changes across the rejected attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FingerprintMode {
    /// Do not fingerprint.
    Off,
    /// Log changed files and continue.
    #[default]
    Warn,
    /// Treat any change as corruption.
    Enforce,
}

impl Display for FingerprintMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Warn => write!(f, "warn"),
            Self::Enforce => write!(f, "enforce"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("4.0", Release::new(4, 0); "four zero")]
    #[test_case("3.6", Release::new(3, 6); "three six")]
    #[test_case(" 4.10 ", Release::new(4, 10); "whitespace and two digit minor")]
    fn release_parses(input: &str, expected: Release) {
        assert_eq!(input.parse::<Release>().unwrap(), expected);
    }

    #[test_case("4"; "missing minor")]
    #[test_case("four.zero"; "not numeric")]
    #[test_case("4.0.1"; "patch component")]
    #[test_case(""; "empty")]
    fn release_rejects(input: &str) {
        assert!(input.parse::<Release>().is_err());
    }

    #[test]
    fn release_ordering_is_numeric() {
        assert!(Release::new(4, 10) > Release::new(4, 2));
        assert!(Release::new(3, 6) < Release::new(4, 0));
    }

    #[test_case("latest", BinaryVersion::Latest)]
    #[test_case("last-lts", BinaryVersion::LastLts)]
    #[test_case("4.2", BinaryVersion::Release(Release::new(4, 2)))]
    fn binary_version_parses(input: &str, expected: BinaryVersion) {
        assert_eq!(input.parse::<BinaryVersion>().unwrap(), expected);
        assert_eq!(expected.to_string(), input);
    }

    #[test]
    fn version_spec_serializes_release_as_string() {
        let spec = VersionSpec::new(Release::new(4, 0), "four_zero");
        let json = serde_json::to_string(&spec).unwrap();
        assert_eq!(
            json,
            r#"{"binary_version":"4.0","test_collection":"four_zero"}"#
        );

        let back: VersionSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn expectations_cover_safety_steps() {
        assert_eq!(
            expectation_for(Step::SkipUpgradeStart).map(|e| e.expected),
            Some(Outcome::Failure)
        );
        assert_eq!(
            expectation_for(Step::Repair).map(|e| e.expected),
            Some(Outcome::Failure)
        );
        assert_eq!(
            expectation_for(Step::Rollback).map(|e| e.expected),
            Some(Outcome::Success)
        );
        assert!(expectation_for(Step::Populate).is_none());
        assert!(expectation_for(Step::Verify).is_none());
    }

    #[test]
    fn endpoint_localhost() {
        let endpoint = Endpoint::localhost(27017);
        assert_eq!(endpoint.port(), 27017);
        assert_eq!(endpoint.to_string(), "127.0.0.1:27017");
    }
}
