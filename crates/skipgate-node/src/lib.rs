//! Store process management for skipgate.
//!
//! Provides the process-level collaborators of the upgrade-refusal protocol:
//! - Resolving `latest` / `last-lts` / `X.Y` selectors to installed binaries
//! - Starting a node against a data directory and waiting for readiness
//! - Clean shutdown with a kill fallback
//! - Running an out-of-process repair and reporting its exit status

pub mod controller;
pub mod error;
pub mod node;
pub mod repair;
pub mod resolver;

pub use controller::{
    NodeLifecycleController, NodeOptions, ProcessHandle, ProcessNodeController, StartOptions,
};
pub use error::{Error, Result};
pub use node::{NodeProcess, NodeStatus};
pub use repair::{ProcessRepairInvoker, RepairInvoker};
pub use resolver::BinaryResolver;
