//! Layered configuration loading.

use crate::{Paths, SkipgateConfig};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Builder for a [`SkipgateConfig`] load.
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    user_config: bool,
}

impl ConfigLoader {
    /// Loads from the current directory.
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "SKIPGATE".to_string(),
            user_config: true,
        }
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Defaults to `SKIPGATE`.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Skip ~/.config/skipgate/config.toml
    pub fn without_user_config(mut self) -> Self {
        self.user_config = false;
        self
    }

    /// Merges defaults, config files and environment, then resolves and validates.
    pub fn load(self) -> Result<SkipgateConfig> {
        self.load_with_env(None)
    }

    /// `env == None` reads the process environment.
    fn load_with_env(self, env: Option<config::Map<String, String>>) -> Result<SkipgateConfig> {
        let defaults = config::Config::try_from(&SkipgateConfig::default())
            .context("Failed to encode default configuration")?;

        let files = Paths::new().existing_sources(&self.project_dir, self.user_config);
        let builder = files.iter().fold(
            config::Config::builder().add_source(defaults),
            |builder, path| {
                builder.add_source(
                    config::File::from(path.as_path()).format(config::FileFormat::Toml),
                )
            },
        );

        // SKIPGATE_NODE__STARTUP_TIMEOUT_MS=5000 sets node.startup_timeout_ms.
        // Values stay strings: numeric parsing would read "4.10" as 4.1.
        let merged = builder
            .add_source(
                config::Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .source(env),
            )
            .build()
            .with_context(|| format!("Failed to merge configuration from {files:?}"))?;

        let mut loaded: SkipgateConfig = merged
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        loaded.resolve_paths(&self.project_dir);
        loaded
            .validate()
            .context("Configuration failed validation")?;

        Ok(loaded)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skipgate_types::{FingerprintMode, Release};
    use std::fs;
    use tempfile::tempdir;

    fn loader(dir: &Path) -> ConfigLoader {
        ConfigLoader::new()
            .with_project_dir(dir)
            .with_env_prefix("SKIPGATE_TEST_UNSET")
            .without_user_config()
    }

    #[test]
    fn test_load_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = loader(temp_dir.path()).load().expect("Failed to load config");

        assert_eq!(config.protocol.last_lts, Release::new(4, 4));
        assert_eq!(config.node.startup_timeout_ms, 30_000);
        assert!(config.matrix.is_empty());
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_content = r#"
[protocol]
last_lts = "4.2"
fingerprint = "enforce"

[node]
startup_timeout_ms = 5000

[[matrix]]
binary_version = "3.6"
test_collection = "three_six"

[[matrix]]
binary_version = "4.0"
test_collection = "four_zero"
"#;
        fs::write(project_dir.join("skipgate.toml"), config_content)
            .expect("Failed to write config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.protocol.last_lts, Release::new(4, 2));
        assert_eq!(config.protocol.fingerprint, FingerprintMode::Enforce);
        assert_eq!(config.node.startup_timeout_ms, 5000);
        assert_eq!(config.matrix.len(), 2);
        assert_eq!(config.matrix[1].binary_version, Release::new(4, 0));
        assert_eq!(config.matrix[1].test_collection, "four_zero");
    }

    #[test]
    fn test_local_overrides() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("skipgate.toml"),
            r#"
[shell]
binary = "mongo"
"#,
        )
        .expect("Failed to write project config");

        fs::write(
            project_dir.join("skipgate.local.toml"),
            r#"
[shell]
binary = "/opt/mongo/bin/mongo"
"#,
        )
        .expect("Failed to write local config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(
            config.shell.binary,
            PathBuf::from("/opt/mongo/bin/mongo")
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("skipgate.toml"),
            "[node]\nbind_ip = \"not-an-ip\"\n",
        )
        .expect("Failed to write config");

        assert!(loader(project_dir).load().is_err());
    }

    #[test]
    fn test_path_resolution() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = loader(temp_dir.path()).load().expect("Failed to load config");

        assert!(config.paths.data_root.is_absolute());
        assert!(config.data_dir().starts_with(temp_dir.path()));
    }

    fn env_vars(vars: &[(&str, &str)]) -> config::Map<String, String> {
        vars.iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn test_env_overrides_keep_release_minor_digits() {
        let temp_dir = tempdir().expect("Failed to create temp dir");

        let config = loader(temp_dir.path())
            .with_env_prefix("SKIPGATE")
            .load_with_env(Some(env_vars(&[
                ("SKIPGATE_PROTOCOL__LAST_LTS", "4.10"),
                ("SKIPGATE_NODE__STARTUP_TIMEOUT_MS", "5000"),
            ])))
            .expect("Failed to load config");

        assert_eq!(config.protocol.last_lts, Release::new(4, 10));
        assert_eq!(config.node.startup_timeout_ms, 5000);
    }

    #[test]
    fn test_env_override_of_whole_release() {
        let temp_dir = tempdir().expect("Failed to create temp dir");

        let config = loader(temp_dir.path())
            .with_env_prefix("SKIPGATE")
            .load_with_env(Some(env_vars(&[("SKIPGATE_PROTOCOL__LAST_LTS", "5.0")])))
            .expect("Failed to load config");

        assert_eq!(config.protocol.last_lts, Release::new(5, 0));
    }
}
