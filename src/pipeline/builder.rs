// src/pipeline/builder.rs

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::{ConfigFile, JobConfig};
use crate::errors::{OrchestratorError, Result};
use crate::fs::FileSystem;
use crate::job::{
    AnalysisTask, CommandJob, CommandKind, CompletionFuture, Invocation, Job, JobSpec,
    ProcessLauncher, TaskJob,
};
use crate::types::JobKind;

use super::order::submission_order;

/// Builds the job list for a [`crate::scheduler::TaskManager`].
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    fs: Arc<dyn FileSystem>,
    launcher: Arc<dyn ProcessLauncher>,
}

impl PipelineBuilder {
    pub fn new(fs: Arc<dyn FileSystem>, launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self { fs, launcher }
    }

    /// Construct every job, predecessors first, with each `after` wired to
    /// the predecessor's completion future.
    pub fn build(&self, cfg: &ConfigFile) -> Result<Vec<Arc<dyn Job>>> {
        let order = submission_order(cfg)?;
        let mut futures: HashMap<&str, CompletionFuture> = HashMap::new();
        let mut jobs: Vec<Arc<dyn Job>> = Vec::with_capacity(order.len());

        for name in &order {
            let (name, job_cfg) = cfg
                .job
                .get_key_value(name.as_str())
                .ok_or_else(|| OrchestratorError::ConfigError(format!("unknown job '{name}'")))?;

            let dependency = match job_cfg.after.as_deref() {
                Some(dep) => Some(futures.get(dep).cloned().ok_or_else(|| {
                    OrchestratorError::ConfigError(format!(
                        "job '{name}' depends on '{dep}', which was not built before it"
                    ))
                })?),
                None => None,
            };

            let job = self.build_job(cfg, name, job_cfg, dependency)?;
            debug!(job = %job.summary(), weight = job.weight(), "built job");
            futures.insert(name.as_str(), job.completion().clone());
            jobs.push(job);
        }

        Ok(jobs)
    }

    fn build_job(
        &self,
        cfg: &ConfigFile,
        name: &str,
        job: &JobConfig,
        dependency: Option<CompletionFuture>,
    ) -> Result<Arc<dyn Job>> {
        let defaults = &cfg.default;
        let mut spec = JobSpec::new(job.effective_summary(name), job.effective_weight(defaults))
            .with_working_dir(job.effective_working_dir(defaults));
        if let Some(dep) = dependency {
            spec = spec.depends_on(dep);
        }

        let command_kind = match job.kind {
            JobKind::Calibration => Some(CommandKind::Calibration),
            JobKind::Averaging => Some(CommandKind::Averaging),
            JobKind::Search => Some(CommandKind::Search),
            JobKind::LibrarySearch => Some(CommandKind::LibrarySearch),
            JobKind::PsmSummary | JobKind::MergeTables => None,
        };

        if let Some(kind) = command_kind {
            let program = job.effective_program(defaults).ok_or_else(|| {
                OrchestratorError::ConfigError(format!("job '{name}' needs a `program`"))
            })?;
            let output_dir = job.output_dir.clone().ok_or_else(|| {
                OrchestratorError::ConfigError(format!("job '{name}' needs an `output_dir`"))
            })?;
            let invocation = Invocation {
                task_files: job.tasks.clone(),
                spectra: job.effective_spectra(defaults),
                databases: job.effective_database(defaults),
                output_dir,
                results_subdir: job.results_subdir.clone(),
                dependency_flag: job.dependency_flag.clone(),
            };
            let job = CommandJob::new(
                spec.with_program(program),
                kind,
                invocation,
                Arc::clone(&self.fs),
                Arc::clone(&self.launcher),
            )?;
            return Ok(Arc::new(job));
        }

        let output_file = job.output_file.clone().ok_or_else(|| {
            OrchestratorError::ConfigError(format!("job '{name}' needs an `output_file`"))
        })?;
        let task = match job.kind {
            JobKind::MergeTables => AnalysisTask::MergeTables {
                pattern: job.effective_pattern().to_string(),
                output_file,
            },
            _ => AnalysisTask::PsmSummary {
                output_file,
                q_value_cutoff: job.effective_q_value_cutoff(),
            },
        };
        let spec = spec.with_program(task.name());
        Ok(Arc::new(TaskJob::new(spec, task, Arc::clone(&self.fs))?))
    }
}
