// src/job/command.rs

//! External pipeline stages: calibration, averaging, GPTMD + search and
//! library-building search.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::errors::Result;
use crate::fs::FileSystem;

use super::launcher::{CommandLine, ProcessLauncher};
use super::oracle::{CompletionOracle, LibrarySearchOracle, MarkedSpectraOracle, SearchOracle};
use super::{BoxFuture, CompletionFuture, Job, JobSpec, dependency_value};

/// Which stage a [`CommandJob`] runs; picks its completion oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Calibration,
    Averaging,
    Search,
    LibrarySearch,
}

/// Arguments of the search-engine command line.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    /// Task definition files (`-t`).
    pub task_files: Vec<PathBuf>,
    /// Input spectra files (`-s`).
    pub spectra: Vec<PathBuf>,
    /// Protein databases (`-d`).
    pub databases: Vec<PathBuf>,
    /// Output directory (`-o`).
    pub output_dir: PathBuf,
    /// Subdirectory of `output_dir` where the stage's result files land.
    pub results_subdir: Option<PathBuf>,
    /// Flag placed before the dependency's value, e.g. `-d` to search
    /// against a library built upstream. Without one the value is appended
    /// bare.
    pub dependency_flag: Option<String>,
}

impl Invocation {
    pub fn results_dir(&self) -> PathBuf {
        match &self.results_subdir {
            Some(sub) => self.output_dir.join(sub),
            None => self.output_dir.clone(),
        }
    }

    /// Build the argument vector for `program`.
    pub fn command_line(&self, program: &str, dependency: Option<&str>) -> CommandLine {
        let mut cmd = CommandLine::new(program);
        push_list(&mut cmd, "-t", &self.task_files);
        push_list(&mut cmd, "-s", &self.spectra);
        push_list(&mut cmd, "-d", &self.databases);
        cmd.arg("-o").arg(&self.output_dir);

        if let Some(value) = dependency {
            if let Some(flag) = &self.dependency_flag {
                cmd.arg(flag);
            }
            cmd.arg(value);
        }
        cmd
    }
}

fn push_list(cmd: &mut CommandLine, flag: &str, paths: &[PathBuf]) {
    if paths.is_empty() {
        return;
    }
    cmd.arg(flag);
    for p in paths {
        cmd.arg(p);
    }
}

/// A pipeline stage run by an external executable.
#[derive(Debug)]
pub struct CommandJob {
    spec: JobSpec,
    kind: CommandKind,
    invocation: Invocation,
    oracle: Box<dyn CompletionOracle>,
    fs: Arc<dyn FileSystem>,
    launcher: Arc<dyn ProcessLauncher>,
    completion: CompletionFuture,
}

impl CommandJob {
    pub fn new(
        spec: JobSpec,
        kind: CommandKind,
        invocation: Invocation,
        fs: Arc<dyn FileSystem>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Result<Self> {
        let inputs = invocation.spectra.len();
        let results_dir = invocation.results_dir();

        let oracle: Box<dyn CompletionOracle> = match kind {
            CommandKind::Calibration => {
                Box::new(MarkedSpectraOracle::calibration(results_dir, inputs)?)
            }
            CommandKind::Averaging => {
                Box::new(MarkedSpectraOracle::averaging(results_dir, inputs)?)
            }
            CommandKind::Search => Box::new(SearchOracle::new(results_dir, inputs)?),
            CommandKind::LibrarySearch => {
                Box::new(LibrarySearchOracle::new(results_dir, inputs)?)
            }
        };

        Ok(Self {
            spec,
            kind,
            invocation,
            oracle,
            fs,
            launcher,
            completion: CompletionFuture::new(),
        })
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    async fn command(&self) -> CommandLine {
        let dependency = dependency_value(&self.spec).await;
        self.invocation
            .command_line(&self.spec.program, dependency.as_deref())
    }
}

impl Job for CommandJob {
    fn spec(&self) -> &JobSpec {
        &self.spec
    }

    fn completion(&self) -> &CompletionFuture {
        &self.completion
    }

    fn has_started_externally(&self) -> bool {
        self.oracle.has_started(self.fs.as_ref())
    }

    fn watched_path(&self) -> Option<&Path> {
        Some(self.oracle.results_dir())
    }

    fn is_completed(&self) -> bool {
        match self.oracle.completed_result(self.fs.as_ref()) {
            Some(result) => {
                if self.completion.resolve(result.as_str()) {
                    info!(job = %self.spec.summary, result = %result, "outputs complete");
                }
                true
            }
            None => false,
        }
    }

    fn prompt(&self) -> BoxFuture<'_, String> {
        Box::pin(async move { self.command().await.to_string() })
    }

    fn run(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let command = self.command().await;
            let exit = self
                .launcher
                .launch(&command, &self.spec.working_dir)
                .await?;

            // The exit code is informational; the outputs decide completion.
            if !exit.success {
                warn!(
                    job = %self.spec.summary,
                    exit_code = exit.code,
                    "process exited unsuccessfully"
                );
            }
            Ok(())
        })
    }
}
