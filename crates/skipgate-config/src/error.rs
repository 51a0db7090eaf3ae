use thiserror::Error;

/// Failures that the layered loader cannot express through `anyhow` context.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value parsed but is unusable, keyed by its dotted path.
    #[error("{key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("no home directory to place user config in")]
    NoUserConfigDir,

    #[error("cannot render configuration as TOML: {0}")]
    Render(#[from] toml::ser::Error),
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}
