//! Error types for document-store access.

use std::time::Duration;
use thiserror::Error;

/// Data access errors.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The shell process could not be spawned.
    #[error("Failed to spawn shell: {0}")]
    SpawnError(String),

    /// The shell did not finish in time.
    #[error("Shell timed out after {0:?}")]
    Timeout(Duration),

    /// The shell exited with a failure status.
    #[error("Shell exited with code {code:?}: {stderr}")]
    ShellFailed { code: Option<i32>, stderr: String },

    /// The store rejected a command.
    #[error("Command '{command}' failed (code {code:?}): {errmsg}")]
    CommandFailed {
        command: String,
        code: Option<i64>,
        errmsg: String,
    },

    /// The reply did not have the expected shape.
    #[error("Unexpected reply to '{command}': {reason}")]
    InvalidReply { command: String, reason: String },

    /// Key pattern could not be interpreted.
    #[error("Invalid key pattern: {0}")]
    InvalidKeyPattern(String),

    /// The named collection does not exist.
    #[error("Collection {0} not found")]
    CollectionNotFound(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for data access operations.
pub type Result<T> = std::result::Result<T, Error>;
