// src/logging.rs

//! Log output for `msrunner`.
//!
//! Everything goes to STDERR through `tracing-subscriber`; STDOUT carries
//! only the end-of-run summary table, so `msrunner run ... > summary.txt`
//! captures the table alone.
//!
//! The filter comes from, in order:
//! 1. `--log-level`, which sets one level for everything;
//! 2. `MSRUNNER_LOG`, read as `EnvFilter` directives, so
//!    `MSRUNNER_LOG=info,msrunner::scheduler=debug` works;
//! 3. `info`.
//!
//! Job events carry a `job` field holding the job summary, which makes a
//! single job's history greppable across interleaved output.

use anyhow::{Result, anyhow};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "MSRUNNER_LOG";

impl From<LogLevel> for LevelFilter {
    fn from(lvl: LogLevel) -> Self {
        match lvl {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Install the global subscriber. Call once, before the first event.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let filter = build_filter(cli_level, env.as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("could not install the log subscriber: {e}"))
}

fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    if let Some(lvl) = cli_level {
        return Ok(EnvFilter::default().add_directive(LevelFilter::from(lvl).into()));
    }
    match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .map_err(|e| anyhow!("invalid {LOG_ENV} value {directives:?}: {e}")),
        None => Ok(EnvFilter::default().add_directive(LevelFilter::INFO.into())),
    }
}
