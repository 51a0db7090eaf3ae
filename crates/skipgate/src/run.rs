//! Running the protocol over a whole matrix.

use crate::validator::{SpecReport, UpgradeAttemptValidator};
use crate::{DataDirectory, Result, VersionMatrix};
use skipgate_client::DataAccessClient;
use skipgate_node::{NodeLifecycleController, RepairInvoker};
use skipgate_types::VersionSpec;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Progress notifications from [`run_matrix`].
#[derive(Debug)]
pub enum RunEvent<'a> {
    SpecStarted {
        spec: &'a VersionSpec,
        index: usize,
        total: usize,
    },
    SpecPassed(&'a SpecReport),
}

/// Every spec of a matrix that passed.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub specs: Vec<SpecReport>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn passed(&self) -> usize {
        self.specs.len()
    }

    /// Specs whose data directory changed across the rejected attempts.
    pub fn drifted(&self) -> impl Iterator<Item = &SpecReport> {
        self.specs.iter().filter(|report| !report.drift.is_empty())
    }
}

/// Validates every matrix entry in order, sharing one data directory.
///
/// Stops at the first failure. Later entries are not attempted.
pub async fn run_matrix<N, R, C>(
    validator: &mut UpgradeAttemptValidator<N, R, C>,
    matrix: &VersionMatrix,
    dir: &mut DataDirectory,
    mut on_event: impl FnMut(RunEvent<'_>),
) -> Result<RunReport>
where
    N: NodeLifecycleController,
    R: RepairInvoker,
    C: DataAccessClient,
{
    let started = Instant::now();
    let total = matrix.len();
    let mut report = RunReport::default();

    info!(total, data_dir = %dir.path().display(), "starting skip-level upgrade run");

    for (index, spec) in matrix.iter().enumerate() {
        on_event(RunEvent::SpecStarted { spec, index, total });

        match validator.validate(spec, dir).await {
            Ok(spec_report) => {
                on_event(RunEvent::SpecPassed(&spec_report));
                report.specs.push(spec_report);
            }
            Err(e) => {
                error!(
                    class = e.class(),
                    step = %e.step(),
                    version = %spec.binary_version,
                    collection = %spec.test_collection,
                    data_dir = %dir.path().display(),
                    error = %e,
                    "run aborted"
                );
                return Err(e);
            }
        }
    }

    report.elapsed = started.elapsed();
    info!(passed = report.passed(), elapsed = ?report.elapsed, "run complete");
    Ok(report)
}
