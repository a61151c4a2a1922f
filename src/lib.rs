// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod fs;
pub mod job;
pub mod logging;
pub mod pipeline;
pub mod scheduler;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, MAX_WEIGHT_ENV, effective_max_weight, load_and_validate};
use crate::fs::RealFileSystem;
use crate::job::DirectLauncher;
use crate::pipeline::{PipelineBuilder, submission_order};
use crate::scheduler::{ManagerOptions, TaskManager};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - pipeline file loading and the weight budget
/// - job construction and dependency wiring
/// - the task manager
/// - the end-of-run summary
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;

    let env_max = std::env::var(MAX_WEIGHT_ENV).ok();
    let max_weight = effective_max_weight(args.max_weight, env_max.as_deref(), &cfg)?;

    if args.dry_run {
        print_dry_run(&cfg, max_weight)?;
        return Ok(());
    }

    if args.poll_interval == Some(0) {
        bail!("--poll-interval must be >= 1 second");
    }
    let options = ManagerOptions {
        poll_interval: args
            .poll_interval
            .map(Duration::from_secs)
            .unwrap_or_else(|| cfg.config.poll_interval()),
        stall_warning: cfg.config.stall_warning(),
        ..ManagerOptions::default()
    };

    let builder = PipelineBuilder::new(Arc::new(RealFileSystem), Arc::new(DirectLauncher));
    let jobs = builder.build(&cfg)?;
    info!(config = %args.config, jobs = jobs.len(), max_weight, "pipeline loaded");

    let manager = TaskManager::new(max_weight, options);
    let report = manager.run(jobs).await?;

    print!("{report}");

    let failed: Vec<_> = report.failed().map(|o| o.summary.as_str()).collect();
    if !failed.is_empty() {
        bail!("{} job(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}

/// Print jobs in submission order with their settings; runs nothing.
fn print_dry_run(cfg: &ConfigFile, max_weight: f64) -> Result<()> {
    println!("msrunner dry-run");
    println!("  max_weight = {max_weight}");
    println!("  poll_interval_secs = {}", cfg.config.poll_interval_secs);
    println!();

    let order = submission_order(cfg)?;
    println!("jobs ({}):", order.len());
    for name in &order {
        let Some(job) = cfg.job.get(name) else {
            continue;
        };
        println!("  - {name} [{}]", job.kind);
        println!("      weight: {}", job.effective_weight(&cfg.default));
        if let Some(ref after) = job.after {
            println!("      after: {after}");
        }
        if let Some(ref dir) = job.output_dir {
            println!("      output_dir: {}", dir.display());
        }
        if let Some(ref file) = job.output_file {
            println!("      output_file: {}", file.display());
        }
        if let Some(program) = job.effective_program(&cfg.default) {
            if job.kind.is_external() {
                println!("      program: {program}");
            }
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
