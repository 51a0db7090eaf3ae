//! Skip-level upgrade refusal verification.
//!
//! For each historical release in a [`VersionMatrix`], the
//! [`UpgradeAttemptValidator`] populates a data directory with that release,
//! confirms the latest binary refuses to start on it and refuses to repair it,
//! then confirms the original release still starts and the data is intact.
//!
//! # Example
//!
//! ```no_run
//! use skipgate::sim::SimulatedStore;
//! use skipgate::{
//!     DataDirectory, UpgradeAttemptValidator, ValidatorOptions, VersionMatrix, run_matrix,
//! };
//!
//! # async fn check() -> skipgate::Result<()> {
//! let store = SimulatedStore::default();
//! let mut validator = UpgradeAttemptValidator::new(
//!     store.clone(),
//!     store.clone(),
//!     store,
//!     ValidatorOptions::default(),
//! );
//! let mut dir = DataDirectory::new("/tmp/skip_level_upgrade");
//! let report = run_matrix(&mut validator, &VersionMatrix::builtin(), &mut dir, |_| {}).await?;
//! assert_eq!(report.passed(), 3);
//! # Ok(())
//! # }
//! ```

mod data_dir;
mod error;
pub mod fingerprint;
mod integrity;
mod matrix;
mod run;
pub mod sim;
mod validator;

pub use data_dir::DataDirectory;
pub use error::{Corruption, Error, Result};
pub use integrity::{DataIntegrityChecker, IntegrityReport, Workload};
pub use matrix::{MatrixError, VersionMatrix};
pub use run::{RunEvent, RunReport, run_matrix};
pub use validator::{SpecReport, StepRecord, UpgradeAttemptValidator, ValidatorOptions};

// Re-export the vocabulary used throughout the API
pub use skipgate_types::{
    BinaryVersion, Endpoint, FingerprintMode, Outcome, Release, Step, VersionSpec,
};
