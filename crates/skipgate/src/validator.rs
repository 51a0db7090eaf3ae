//! The five-step upgrade-refusal protocol for a single version.
//!
//! For one [`VersionSpec`]:
//!
//! 1. **Populate**: start the historical binary on a clean directory, write the
//!    workload, stop it cleanly.
//! 2. **Skip-upgrade start**: start `latest` over that directory. It must refuse.
//! 3. **Repair**: run `latest --repair` over the directory. It must exit non-zero.
//! 4. **Rollback**: start the historical binary again. It must come up.
//! 5. **Verify**: the workload must still be there, then stop.
//!
//! Each step runs only after the previous one met its expectation. Every node
//! that comes up is stopped before the validator returns, whatever the outcome.

use crate::fingerprint::Fingerprint;
use crate::integrity::{DataIntegrityChecker, IntegrityReport, Workload};
use crate::{Corruption, DataDirectory, Error, Result};
use skipgate_client::DataAccessClient;
use skipgate_node::{NodeLifecycleController, ProcessHandle, RepairInvoker, StartOptions};
use skipgate_types::{
    BinaryVersion, Endpoint, FingerprintMode, Outcome, Step, VersionSpec, expectation_for,
};
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Settings that are the same for every spec in a run.
#[derive(Debug, Clone, Default)]
pub struct ValidatorOptions {
    pub workload: Workload,
    pub fingerprint: FingerprintMode,
    pub fingerprint_exclude: Vec<String>,
}

/// What one step observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: Step,
    pub outcome: Outcome,
    pub detail: String,
}

/// A spec that completed all five steps.
#[derive(Debug, Clone)]
pub struct SpecReport {
    pub spec: VersionSpec,
    pub steps: Vec<StepRecord>,
    pub integrity: IntegrityReport,
    /// Files that changed across the rejected attempts, when fingerprinting is on.
    pub drift: Vec<String>,
    pub elapsed: Duration,
}

/// Drives the protocol through its collaborators.
pub struct UpgradeAttemptValidator<N, R, C> {
    nodes: N,
    repair: R,
    client: C,
    checker: DataIntegrityChecker,
    options: ValidatorOptions,
}

impl<N, R, C> UpgradeAttemptValidator<N, R, C>
where
    N: NodeLifecycleController,
    R: RepairInvoker,
    C: DataAccessClient,
{
    pub fn new(nodes: N, repair: R, client: C, options: ValidatorOptions) -> Self {
        Self {
            nodes,
            repair,
            client,
            checker: DataIntegrityChecker::new(options.workload.clone()),
            options,
        }
    }

    pub fn into_parts(self) -> (N, R, C) {
        (self.nodes, self.repair, self.client)
    }

    /// Runs all five steps for `spec` in `dir`.
    ///
    /// The directory is reset before populate and again after a passing verify.
    /// On failure it is left as the failing step found it.
    pub async fn validate(
        &mut self,
        spec: &VersionSpec,
        dir: &mut DataDirectory,
    ) -> Result<SpecReport> {
        let span = info_span!(
            "validate",
            version = %spec.binary_version,
            collection = %spec.test_collection
        );
        self.run_steps(spec, dir).instrument(span).await
    }

    async fn run_steps(
        &mut self,
        spec: &VersionSpec,
        dir: &mut DataDirectory,
    ) -> Result<SpecReport> {
        let started = Instant::now();
        let mut steps = Vec::with_capacity(Step::ALL.len());

        dir.reset().map_err(|e| reset_failed(spec, Step::Populate, dir, &e))?;

        let port = self.populate(spec, dir).await?;
        steps.push(StepRecord {
            step: Step::Populate,
            outcome: Outcome::Success,
            detail: format!(
                "wrote {} on port {port}",
                self.options.workload.namespace(spec)
            ),
        });

        let before = self.fingerprint(spec, dir, Step::Populate)?;

        steps.push(self.skip_level_start(spec, dir).await?);
        steps.push(self.repair(spec, dir, port).await?);

        let drift = match before {
            Some(before) => self.compare_fingerprint(spec, dir, &before)?,
            None => Vec::new(),
        };

        let handle = self.rollback(spec, dir).await?;
        steps.push(StepRecord {
            step: Step::Rollback,
            outcome: Outcome::Success,
            detail: handle
                .endpoint
                .map_or_else(String::new, |endpoint| format!("up at {endpoint}")),
        });

        let integrity = self.verify(spec, handle).await?;
        steps.push(StepRecord {
            step: Step::Verify,
            outcome: Outcome::Success,
            detail: format!(
                "{} document(s), index '{}'",
                integrity.document_count, integrity.index_name
            ),
        });

        dir.reset().map_err(|e| reset_failed(spec, Step::Verify, dir, &e))?;

        let elapsed = started.elapsed();
        info!(?elapsed, "skip-level upgrade refused and data intact");

        Ok(SpecReport {
            spec: spec.clone(),
            steps,
            integrity,
            drift,
            elapsed,
        })
    }

    async fn populate(&mut self, spec: &VersionSpec, dir: &mut DataDirectory) -> Result<u16> {
        let version = BinaryVersion::Release(spec.binary_version);
        let handle = self
            .nodes
            .start(version, dir.path(), &StartOptions::default())
            .await
            .map_err(|e| Error::environment(spec, Step::Populate, e))?;

        let Some(endpoint) = handle.endpoint else {
            return Err(Error::environment(
                spec,
                Step::Populate,
                format!("{version} did not start on a clean data directory"),
            ));
        };
        dir.claim(spec);

        let written = self
            .options
            .workload
            .apply(&self.client, endpoint, spec)
            .await;
        let stopped = self.nodes.stop(handle).await;

        written.map_err(|e| Error::environment(spec, Step::Populate, e))?;
        stopped.map_err(|e| {
            Error::environment(spec, Step::Populate, format!("clean shutdown failed: {e}"))
        })?;

        info!(step = %Step::Populate, %endpoint, "populated");
        Ok(endpoint.port())
    }

    async fn skip_level_start(
        &mut self,
        spec: &VersionSpec,
        dir: &DataDirectory,
    ) -> Result<StepRecord> {
        let step = Step::SkipUpgradeStart;
        let handle = self
            .nodes
            .start(BinaryVersion::Latest, dir.path(), &StartOptions::preserve_data())
            .await
            .map_err(|e| Error::environment(spec, step, e))?;

        let observed = outcome_of(&handle);
        if let Some(endpoint) = handle.endpoint {
            error!(%step, %endpoint, "latest started over skip-level data");
            self.release(handle, step).await;
            return Err(Error::UpgradeSafetyViolation {
                spec: spec.clone(),
                endpoint,
            });
        }

        self.release(handle, step).await;
        info!(%step, "latest refused to start");

        Ok(StepRecord {
            step,
            outcome: observed,
            detail: "refused".to_string(),
        })
    }

    async fn repair(
        &mut self,
        spec: &VersionSpec,
        dir: &DataDirectory,
        port: u16,
    ) -> Result<StepRecord> {
        let step = Step::Repair;
        let exit_code = self
            .repair
            .repair(BinaryVersion::Latest, dir.path(), Some(port))
            .await
            .map_err(|e| Error::environment(spec, step, e))?;

        let observed = if exit_code == 0 {
            Outcome::Success
        } else {
            Outcome::Failure
        };
        if !meets_expectation(step, observed) {
            error!(%step, exit_code, "repair accepted skip-level data");
            return Err(Error::RepairSafetyViolation {
                spec: spec.clone(),
                exit_code,
            });
        }

        info!(%step, exit_code, "repair refused");
        Ok(StepRecord {
            step,
            outcome: observed,
            detail: format!("exit code {exit_code}"),
        })
    }

    async fn rollback(
        &mut self,
        spec: &VersionSpec,
        dir: &DataDirectory,
    ) -> Result<ProcessHandle> {
        let step = Step::Rollback;
        let handle = self
            .nodes
            .start(
                BinaryVersion::Release(spec.binary_version),
                dir.path(),
                &StartOptions::preserve_data(),
            )
            .await
            .map_err(|e| Error::environment(spec, step, e))?;

        if !meets_expectation(step, outcome_of(&handle)) {
            error!(%step, "original version refused its own data");
            return Err(Error::corruption(spec, step, Corruption::RollbackRejected));
        }

        info!(%step, "original version restarted");
        Ok(handle)
    }

    async fn verify(
        &mut self,
        spec: &VersionSpec,
        handle: ProcessHandle,
    ) -> Result<IntegrityReport> {
        let step = Step::Verify;
        let checked = match handle.endpoint {
            Some(endpoint) => self.checker.check(&self.client, endpoint, spec).await,
            None => Err(Error::corruption(
                spec,
                Step::Rollback,
                Corruption::RollbackRejected,
            )),
        };
        let stopped = self.nodes.stop(handle).await;

        let report = checked?;
        stopped.map_err(|e| {
            Error::environment(spec, step, format!("clean shutdown failed: {e}"))
        })?;

        info!(%step, documents = report.document_count, index = %report.index_name, "data intact");
        Ok(report)
    }

    fn fingerprint(
        &self,
        spec: &VersionSpec,
        dir: &DataDirectory,
        step: Step,
    ) -> Result<Option<Fingerprint>> {
        if self.options.fingerprint == FingerprintMode::Off {
            return Ok(None);
        }

        let fingerprint = Fingerprint::capture(dir.path(), &self.options.fingerprint_exclude)
            .map_err(|e| Error::environment(spec, step, format!("fingerprint failed: {e}")))?;
        debug!(files = fingerprint.len(), digest = %fingerprint.digest(), "fingerprint taken");
        Ok(Some(fingerprint))
    }

    fn compare_fingerprint(
        &self,
        spec: &VersionSpec,
        dir: &DataDirectory,
        before: &Fingerprint,
    ) -> Result<Vec<String>> {
        let Some(after) = self.fingerprint(spec, dir, Step::Repair)? else {
            return Ok(Vec::new());
        };

        let changed: Vec<String> = before
            .diff(&after)
            .iter()
            .map(ToString::to_string)
            .collect();
        if changed.is_empty() {
            return Ok(changed);
        }

        if self.options.fingerprint == FingerprintMode::Enforce {
            error!(changed = ?changed, "data directory changed across rejected attempts");
            return Err(Error::corruption(
                spec,
                Step::Repair,
                Corruption::FingerprintChanged { changed },
            ));
        }

        warn!(changed = ?changed, "data directory changed across rejected attempts");
        Ok(changed)
    }

    /// Stops `handle`, logging rather than returning a failure. Used on paths
    /// that already carry a more important result.
    async fn release(&mut self, handle: ProcessHandle, step: Step) {
        let endpoint: Option<Endpoint> = handle.endpoint;
        if let Err(e) = self.nodes.stop(handle).await {
            warn!(%step, ?endpoint, error = %e, "failed to stop node");
        }
    }
}

fn reset_failed(spec: &VersionSpec, step: Step, dir: &DataDirectory, e: &std::io::Error) -> Error {
    Error::environment(spec, step, format!("reset {}: {e}", dir.path().display()))
}

fn outcome_of(handle: &ProcessHandle) -> Outcome {
    if handle.is_live() {
        Outcome::Success
    } else {
        Outcome::Failure
    }
}

fn meets_expectation(step: Step, observed: Outcome) -> bool {
    expectation_for(step).is_none_or(|expectation| expectation.is_met_by(observed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expectations_per_step() {
        assert!(meets_expectation(Step::SkipUpgradeStart, Outcome::Failure));
        assert!(!meets_expectation(Step::SkipUpgradeStart, Outcome::Success));
        assert!(meets_expectation(Step::Repair, Outcome::Failure));
        assert!(!meets_expectation(Step::Repair, Outcome::Success));
        assert!(meets_expectation(Step::Rollback, Outcome::Success));
        assert!(!meets_expectation(Step::Rollback, Outcome::Failure));
        // Populate and verify carry no expectation of their own
        assert!(meets_expectation(Step::Populate, Outcome::Success));
    }
}
