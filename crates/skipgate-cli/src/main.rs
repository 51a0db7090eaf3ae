//! skipgate CLI.
//!
//! Checks that the latest store binary refuses to open data directories
//! written by releases older than last-lts, and that those directories
//! survive the attempt.
//!
//! # Quick Start
//!
//! ```bash
//! # Dry run against the simulated store
//! skipgate run --simulate
//!
//! # Real binaries, one release only
//! skipgate run --only 4.0 --verbose
//! ```

mod commands;
mod style;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use skipgate_types::{FingerprintMode, Release};

/// skipgate - skip-level upgrade refusal verifier.
#[derive(Parser)]
#[command(name = "skipgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory holding skipgate.toml.
    #[arg(short, long, global = true, default_value = ".")]
    project: String,

    /// Log at DEBUG instead of INFO.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the upgrade-refusal protocol over the version matrix.
    Run {
        /// Use the in-process simulated store instead of real binaries.
        #[arg(long)]
        simulate: bool,

        /// Only run these releases (repeatable, e.g. --only 4.0).
        #[arg(long, value_name = "X.Y")]
        only: Vec<Release>,

        /// Override protocol.fingerprint.
        #[arg(long, value_enum)]
        fingerprint: Option<FingerprintArg>,
    },

    /// Show the version matrix that `run` would use.
    Matrix,

    /// Configuration commands.
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Show version information.
    Version,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the merged configuration.
    Show {
        /// Output format.
        #[arg(short, long, value_enum, default_value = "text")]
        format: commands::config::Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FingerprintArg {
    Off,
    Warn,
    Enforce,
}

impl From<FingerprintArg> for FingerprintMode {
    fn from(arg: FingerprintArg) -> Self {
        match arg {
            FingerprintArg::Off => Self::Off,
            FingerprintArg::Warn => Self::Warn,
            FingerprintArg::Enforce => Self::Enforce,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .init();

    style::set_no_color(cli.no_color);

    match cli.command {
        Commands::Run {
            simulate,
            only,
            fingerprint,
        } => {
            commands::run::run(&cli.project, simulate, &only, fingerprint.map(Into::into)).await
        }
        Commands::Matrix => commands::matrix::run(&cli.project),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show { format } => commands::config::show(&cli.project, format),
        },
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
    }
}
