//! Configuration commands.

use anyhow::{Context, Result};
use clap::ValueEnum;
use skipgate_config::SkipgateConfig;

use crate::style::{self, colors::SemanticStyle};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Format {
    Text,
    Toml,
    Json,
}

/// Show the merged configuration.
pub fn show(project: &str, format: Format) -> Result<()> {
    let config =
        SkipgateConfig::load_from_dir(project).context("Failed to load configuration")?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        Format::Toml => println!("{}", config.to_toml()?),
        Format::Text => print_text(&config),
    }

    Ok(())
}

fn print_text(config: &SkipgateConfig) {
    println!("{}", "skipgate configuration".header());
    println!();

    println!("Paths:");
    style::print_labeled("Data directory", &config.data_dir().display().to_string().code());
    style::print_labeled(
        "Multiversion dir",
        &config.paths.multiversion_dir.display().to_string().code(),
    );
    style::print_labeled("Latest binary", &config.paths.latest_binary.display().to_string());
    style::print_labeled("Log dir", &config.paths.log_dir.display().to_string());
    println!();

    println!("Node:");
    style::print_labeled("Binary name", &config.node.binary_name);
    style::print_labeled("Bind IP", &config.node.bind_ip);
    style::print_labeled("Startup timeout", &format!("{:?}", config.node.startup_timeout()));
    style::print_labeled("Shutdown timeout", &format!("{:?}", config.node.shutdown_timeout()));
    style::print_labeled("Repair timeout", &format!("{:?}", config.node.repair_timeout()));
    println!();

    println!("Shell:");
    style::print_labeled("Binary", &config.shell.binary.display().to_string());
    style::print_labeled("Database", &config.shell.database);
    println!();

    println!("Protocol:");
    style::print_labeled("Last LTS", &config.protocol.last_lts.to_string());
    style::print_labeled("Fingerprint", &config.protocol.fingerprint.to_string());
    style::print_labeled("Excluded", &config.protocol.fingerprint_exclude.join(", "));
    println!();

    let matrix = if config.matrix.is_empty() {
        "built-in".to_string()
    } else {
        format!("{} configured entries", config.matrix.len())
    };
    style::print_labeled("Matrix", &matrix);
}
