// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `msrunner`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "msrunner",
    version,
    about = "Run a chain of search-pipeline jobs under a shared weight budget.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the pipeline file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Pipeline.toml")]
    pub config: String,

    /// Total weight of jobs allowed to run at once.
    ///
    /// Overrides `MSRUNNER_MAX_WEIGHT` and `[config].max_weight`.
    #[arg(long, value_name = "WEIGHT")]
    pub max_weight: Option<f64>,

    /// Seconds between completion checks on jobs run elsewhere.
    ///
    /// Overrides `[config].poll_interval_secs`.
    #[arg(long, value_name = "SECS")]
    pub poll_interval: Option<u64>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `MSRUNNER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the jobs in submission order, run nothing.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
