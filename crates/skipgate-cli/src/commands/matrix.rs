//! Matrix command implementation.

use anyhow::{Context, Result};
use skipgate_config::SkipgateConfig;

use crate::commands::run::{binary_resolver, version_matrix};
use crate::style::{self, colors::SemanticStyle};

/// Print the matrix `run` would use and check it against last-lts.
pub fn run(project: &str) -> Result<()> {
    let config =
        SkipgateConfig::load_from_dir(project).context("Failed to load configuration")?;
    let matrix = version_matrix(&config, &[]);
    let resolver = binary_resolver(&config);

    let rows = matrix
        .iter()
        .map(|spec| {
            let binary = resolver.release_path(spec.binary_version);
            let installed = if binary.exists() {
                "yes".success()
            } else {
                "no".warning()
            };
            vec![
                spec.binary_version.to_string(),
                spec.test_collection.clone(),
                format!("{}.{}", config.shell.database, spec.test_collection),
                binary.display().to_string(),
                installed,
            ]
        })
        .collect();

    println!(
        "{}",
        style::grid(
            &["Release", "Collection", "Namespace", "Binary", "Installed"],
            rows
        )
    );

    let last_lts = config.protocol.last_lts;
    matrix
        .check_against(last_lts)
        .context("Matrix is not valid for a skip-level run")?;
    style::print_success(&format!(
        "{} entries, all older than last-lts {}",
        matrix.len(),
        last_lts.to_string().info()
    ));

    Ok(())
}
