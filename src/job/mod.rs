// src/job/mod.rs

//! The unit of schedulable work.
//!
//! - [`future`] holds the single-assignment completion future jobs resolve
//!   and dependents await.
//! - [`oracle`] decides from output directories whether a job has started
//!   or finished, wherever it ran.
//! - [`launcher`] spawns external processes.
//! - [`command`] implements the external pipeline stages.
//! - [`adapter`] puts in-process analysis tasks behind the same interface.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use crate::errors::Result;

pub mod adapter;
pub mod command;
pub mod future;
pub mod launcher;
pub mod oracle;

pub use adapter::{AnalysisTask, TaskJob};
pub use command::{CommandJob, CommandKind, Invocation};
pub use future::CompletionFuture;
pub use launcher::{CommandLine, DirectLauncher, ExitReport, ProcessLauncher};
pub use oracle::{CompletionOracle, LibrarySearchOracle, MarkedSpectraOracle, SearchOracle};

/// Boxed future used at the trait seams, as in the executor backends.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Parameters fixed when the driver constructs a job.
#[derive(Debug, Clone)]
pub struct JobSpec {
    /// Human-readable description used in logs and the final report.
    pub summary: String,
    /// Abstract resource cost charged against the budget while admitted.
    pub weight: f64,
    pub working_dir: PathBuf,
    /// Executable (or task name, for in-process jobs).
    pub program: String,
    /// Completion future of the one job this job waits on.
    pub dependency: Option<CompletionFuture>,
}

impl JobSpec {
    pub fn new(summary: impl Into<String>, weight: f64) -> Self {
        Self {
            summary: summary.into(),
            weight,
            working_dir: PathBuf::from("."),
            program: String::new(),
            dependency: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn depends_on(mut self, dependency: CompletionFuture) -> Self {
        self.dependency = Some(dependency);
        self
    }
}

/// A schedulable unit of work.
///
/// The scheduler only ever calls [`Job::run`] after the job has been
/// admitted under the weight budget and its dependency has resolved.
pub trait Job: Send + Sync + fmt::Debug {
    fn spec(&self) -> &JobSpec;

    /// Resolved with the job's result value once its outputs are verified.
    fn completion(&self) -> &CompletionFuture;

    /// Whether any execution of this job, here or elsewhere, has begun.
    /// Read-only.
    fn has_started_externally(&self) -> bool;

    /// Where completion is read from, for diagnostics.
    fn watched_path(&self) -> Option<&Path> {
        None
    }

    /// Whether the job's outputs are fully present.
    ///
    /// A `true` return resolves [`Job::completion`] first. Repeated calls
    /// before completion return `false` and resolve nothing.
    fn is_completed(&self) -> bool;

    /// Build the invocation, waiting for the dependency's value first.
    fn prompt(&self) -> BoxFuture<'_, String>;

    /// Do the work and return when it has finished.
    fn run(&self) -> BoxFuture<'_, Result<()>>;

    fn summary(&self) -> &str {
        &self.spec().summary
    }

    fn weight(&self) -> f64 {
        self.spec().weight
    }
}

/// Wait for the dependency of `spec`, if any, and return its value.
pub(crate) async fn dependency_value(spec: &JobSpec) -> Option<String> {
    match &spec.dependency {
        Some(dep) => Some(dep.wait().await),
        None => None,
    }
}
