//! Run command implementation.

use anyhow::{Context, Result, bail};
use indicatif::ProgressBar;
use skipgate::sim::SimulatedStore;
use skipgate::{
    DataDirectory, RunEvent, RunReport, SpecReport, Step, UpgradeAttemptValidator,
    ValidatorOptions, VersionMatrix, Workload, run_matrix,
};
use skipgate_client::{DataAccessClient, ShellClient, ShellOptions};
use skipgate_config::SkipgateConfig;
use skipgate_node::{
    BinaryResolver, NodeLifecycleController, NodeOptions, ProcessNodeController,
    ProcessRepairInvoker, RepairInvoker,
};
use skipgate_types::{FingerprintMode, Release};

use crate::style::{self, colors::SemanticStyle};

/// Resolver for the binaries named in `config`.
pub fn binary_resolver(config: &SkipgateConfig) -> BinaryResolver {
    BinaryResolver::new(
        &config.paths.latest_binary,
        &config.paths.multiversion_dir,
        &config.node.binary_name,
        config.protocol.last_lts,
    )
}

/// The configured matrix, or the built-in one, narrowed to `only` when given.
pub fn version_matrix(config: &SkipgateConfig, only: &[Release]) -> VersionMatrix {
    let matrix = if config.matrix.is_empty() {
        VersionMatrix::builtin()
    } else {
        VersionMatrix::from_entries(config.matrix.clone())
    };

    if only.is_empty() {
        matrix
    } else {
        matrix.only(only)
    }
}

/// Run the protocol over the matrix. Fails on the first violation.
pub async fn run(
    project: &str,
    simulate: bool,
    only: &[Release],
    fingerprint: Option<FingerprintMode>,
) -> Result<()> {
    let config =
        SkipgateConfig::load_from_dir(project).context("Failed to load configuration")?;

    let matrix = version_matrix(&config, only);
    if matrix.is_empty() {
        let requested: Vec<String> = only.iter().map(ToString::to_string).collect();
        bail!("No matrix entries match --only {}", requested.join(", "));
    }
    matrix
        .check_against(config.protocol.last_lts)
        .context("Matrix is not valid for a skip-level run")?;

    let options = ValidatorOptions {
        workload: Workload {
            database: config.shell.database.clone(),
            ..Workload::default()
        },
        fingerprint: fingerprint.unwrap_or(config.protocol.fingerprint),
        fingerprint_exclude: config.protocol.fingerprint_exclude.clone(),
    };
    let mut dir = DataDirectory::new(config.data_dir());

    println!(
        "Checking {} release(s) in {}{}",
        matrix.len(),
        dir.path().display().to_string().code(),
        if simulate { " (simulated)" } else { "" }
    );
    println!();

    let outcome = if simulate {
        let store = SimulatedStore::new(SimulatedStore::default_train(), config.protocol.last_lts);
        let mut validator =
            UpgradeAttemptValidator::new(store.clone(), store.clone(), store, options);
        execute(&mut validator, &matrix, &mut dir).await
    } else {
        let resolver = binary_resolver(&config);
        let shell = ShellClient::new(ShellOptions {
            binary: config.shell.binary.clone(),
            timeout: config.shell.timeout(),
        });
        let node_options = NodeOptions {
            bind_ip: config
                .node
                .bind_ip
                .parse()
                .context("node.bind_ip is not an IP address")?,
            startup_timeout: config.node.startup_timeout(),
            shutdown_timeout: config.node.shutdown_timeout(),
            extra_args: config.node.extra_args.clone(),
            log_dir: Some(config.paths.log_dir.clone()),
            ..NodeOptions::default()
        };
        let nodes = ProcessNodeController::new(resolver.clone(), node_options, shell.clone());
        let repair = ProcessRepairInvoker::new(resolver, config.node.repair_timeout());

        let mut validator = UpgradeAttemptValidator::new(nodes, repair, shell, options);
        let outcome = execute(&mut validator, &matrix, &mut dir).await;

        let (mut nodes, _, _) = validator.into_parts();
        nodes.stop_all().await;
        outcome
    };

    println!();
    match outcome {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            style::print_error(&e.to_string());
            style::print_hint(&format!(
                "Data directory left in place: {}",
                dir.path().display()
            ));
            let summary = format!("{} at step '{}'", e.class(), e.step());
            Err(e).context(summary)
        }
    }
}

async fn execute<N, R, C>(
    validator: &mut UpgradeAttemptValidator<N, R, C>,
    matrix: &VersionMatrix,
    dir: &mut DataDirectory,
) -> skipgate::Result<RunReport>
where
    N: NodeLifecycleController,
    R: RepairInvoker,
    C: DataAccessClient,
{
    let mut spinner: Option<ProgressBar> = None;

    let result = run_matrix(validator, matrix, dir, |event| match event {
        RunEvent::SpecStarted { spec, index, total } => {
            spinner = Some(style::create_spinner(&format!(
                "[{}/{total}] {spec}",
                index + 1
            )));
        }
        RunEvent::SpecPassed(report) => {
            if let Some(pb) = spinner.take() {
                style::finish_success(
                    &pb,
                    &format!(
                        "{} refused, data intact ({:.1?})",
                        report.spec, report.elapsed
                    ),
                );
            }
        }
    })
    .await;

    if let (Err(e), Some(pb)) = (&result, spinner.take()) {
        style::finish_error(&pb, &format!("{} failed at {}", e.spec(), e.step()));
    }
    result
}

fn step_detail(report: &SpecReport, step: Step) -> String {
    report
        .steps
        .iter()
        .find(|record| record.step == step)
        .map_or_else(|| "-".to_string(), |record| record.detail.clone())
}

fn print_report(report: &RunReport) {
    let rows = report
        .specs
        .iter()
        .map(|spec_report| {
            vec![
                spec_report.spec.binary_version.to_string(),
                spec_report.spec.test_collection.clone(),
                step_detail(spec_report, Step::SkipUpgradeStart),
                step_detail(spec_report, Step::Repair),
                step_detail(spec_report, Step::Verify),
                format!("{:.1?}", spec_report.elapsed),
            ]
        })
        .collect();

    println!(
        "{}",
        style::grid(
            &["Release", "Collection", "Latest start", "Repair", "Verified", "Time"],
            rows
        )
    );

    for drifted in report.drifted() {
        style::print_warn(&format!(
            "{}: files changed across rejected attempts: {}",
            drifted.spec,
            drifted.drift.join(", ")
        ));
    }

    style::print_success(&format!(
        "{} release(s) refused the skip-level upgrade with data intact ({:.1?})",
        report.passed(),
        report.elapsed
    ));
}
