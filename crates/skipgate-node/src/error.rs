//! Error types for node lifecycle management.

use skipgate_types::BinaryVersion;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Node lifecycle errors.
///
/// These are harness faults: the attempt could not be made at all. A node
/// that was launched and then refused to come up is not an error, it is a
/// [`ProcessHandle`](crate::ProcessHandle) without an endpoint.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No binary installed for the requested version.
    #[error("No binary for version {version} at {path}")]
    BinaryNotFound {
        version: BinaryVersion,
        path: PathBuf,
    },

    /// Process spawn error.
    #[error("Failed to spawn {binary}: {reason}")]
    SpawnError { binary: PathBuf, reason: String },

    /// Handle does not belong to this controller.
    #[error("Node {0} is not managed by this controller")]
    UnknownNode(u64),

    /// A node ignored the shutdown request and had to be killed.
    #[error("Node {node} did not shut down within {after:?} and was killed")]
    UncleanShutdown { node: u64, after: Duration },

    /// A process did not finish in time.
    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },

    /// Shell error while talking to a node.
    #[error("Shell error: {0}")]
    Shell(#[from] skipgate_client::Error),
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;
