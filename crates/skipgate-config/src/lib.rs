//! Configuration management for skipgate
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (SKIPGATE_* prefix, `__` between levels)
//! 2. skipgate.local.toml (gitignored, local overrides)
//! 3. skipgate.toml (git-tracked, project config)
//! 4. ~/.config/skipgate/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use skipgate_types::{FingerprintMode, Release, VersionSpec};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main skipgate configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkipgateConfig {
    pub paths: PathsConfig,
    pub node: NodeConfig,
    pub shell: ShellConfig,
    pub protocol: ProtocolConfig,
    /// Overrides the built-in version matrix when non-empty.
    pub matrix: Vec<VersionSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Parent of the per-run data directory.
    pub data_root: PathBuf,
    /// Historical binaries, named `<binary>-<major>.<minor>`.
    pub multiversion_dir: PathBuf,
    /// Binary under test; a bare name is looked up on PATH.
    pub latest_binary: PathBuf,
    /// Node log files.
    pub log_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from(".skipgate/data"),
            multiversion_dir: PathBuf::from("/data/multiversion"),
            latest_binary: PathBuf::from("mongod"),
            log_dir: PathBuf::from(".skipgate/logs"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub binary_name: String,
    pub bind_ip: String,
    pub startup_timeout_ms: u64,
    pub shutdown_timeout_ms: u64,
    pub repair_timeout_ms: u64,
    pub extra_args: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            binary_name: "mongod".to_string(),
            bind_ip: "127.0.0.1".to_string(),
            startup_timeout_ms: 30_000,
            shutdown_timeout_ms: 10_000,
            repair_timeout_ms: 120_000,
            extra_args: Vec::new(),
        }
    }
}

impl NodeConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn repair_timeout(&self) -> Duration {
        Duration::from_millis(self.repair_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub binary: PathBuf,
    pub database: String,
    pub timeout_ms: u64,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("mongo"),
            database: "test".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl ShellConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub last_lts: Release,
    /// Name of the data directory created under `paths.data_root`.
    pub dir_name: String,
    pub fingerprint: FingerprintMode,
    /// File names or `*.ext` patterns left out of fingerprints.
    pub fingerprint_exclude: Vec<String>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            last_lts: Release::new(4, 4),
            dir_name: "skip_level_upgrade".to_string(),
            fingerprint: FingerprintMode::Warn,
            fingerprint_exclude: vec![
                "mongod.lock".to_string(),
                "WiredTiger.lock".to_string(),
                "diagnostic.data".to_string(),
                "*.log".to_string(),
            ],
        }
    }
}

impl SkipgateConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Directory the protocol populates and resets.
    pub fn data_dir(&self) -> PathBuf {
        self.paths.data_root.join(&self.protocol.dir_name)
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        for path in [
            &mut self.paths.data_root,
            &mut self.paths.multiversion_dir,
            &mut self.paths.log_dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }

        // Bare binary names stay PATH lookups.
        if self.paths.latest_binary.is_relative()
            && self.paths.latest_binary.components().count() > 1
        {
            self.paths.latest_binary = base.join(&self.paths.latest_binary);
        }
    }

    /// Renders the configuration in `skipgate.toml` syntax.
    pub fn to_toml(&self) -> std::result::Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks values the loader cannot type-check.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.node.binary_name.trim().is_empty() {
            return Err(ConfigError::invalid("node.binary_name", "must not be empty"));
        }

        if self.node.bind_ip.parse::<std::net::IpAddr>().is_err() {
            return Err(ConfigError::invalid(
                "node.bind_ip",
                format!("'{}' is not an IP address", self.node.bind_ip),
            ));
        }

        if self.node.startup_timeout_ms == 0 {
            return Err(ConfigError::invalid("node.startup_timeout_ms", "must be positive"));
        }
        if self.shell.timeout_ms == 0 {
            return Err(ConfigError::invalid("shell.timeout_ms", "must be positive"));
        }

        let dir_name = self.protocol.dir_name.trim();
        if dir_name.is_empty() || dir_name.contains(['/', '\\']) {
            return Err(ConfigError::invalid(
                "protocol.dir_name",
                format!("'{}' must be a single path component", self.protocol.dir_name),
            ));
        }

        Ok(())
    }
}
