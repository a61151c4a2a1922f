// src/scheduler/manager.rs

//! The run driver: evaluates each job once, admits it under the weight
//! budget, and records how it ended.
//!
//! Per job: `Pending -> ExternallyActive -> Completed` when its outputs
//! already exist (no weight charged, never launched), otherwise
//! `Pending -> Admitted -> Completed | Failed`. There are no retries and no
//! timeouts; a job whose dependency never resolves waits forever.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::errors::{OrchestratorError, Result};
use crate::job::Job;
use crate::types::JobState;

use super::budget::{AdmissionTicket, DEFAULT_ADMISSION_POLL, WeightBudget};
use super::report::{JobOutcome, RunReport};

/// Timing knobs of a run.
#[derive(Debug, Clone, Copy)]
pub struct ManagerOptions {
    /// Interval between completion checks on externally active jobs.
    pub poll_interval: Duration,
    /// Interval between "still waiting on dependency" warnings.
    pub stall_warning: Duration,
    /// Fallback re-check interval for jobs waiting on the budget.
    pub admission_poll: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            stall_warning: Duration::from_secs(600),
            admission_poll: DEFAULT_ADMISSION_POLL,
        }
    }
}

/// Runs a list of jobs under one weight budget.
#[derive(Debug)]
pub struct TaskManager {
    budget: Arc<WeightBudget>,
    options: ManagerOptions,
}

impl TaskManager {
    pub fn new(max_weight: f64, options: ManagerOptions) -> Self {
        Self {
            budget: Arc::new(WeightBudget::with_poll(max_weight, options.admission_poll)),
            options,
        }
    }

    pub fn budget(&self) -> &Arc<WeightBudget> {
        &self.budget
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    /// Run every job to completion or failure.
    ///
    /// Jobs are evaluated in the given order; independent jobs are queued
    /// for admission in that order. Fails up front, before anything runs,
    /// on an empty list or a weight the budget can never hold.
    pub async fn run(&self, jobs: Vec<Arc<dyn Job>>) -> Result<RunReport> {
        if jobs.is_empty() {
            return Err(OrchestratorError::EmptyJobList);
        }
        let max_weight = self.budget.max_weight();
        for job in &jobs {
            let weight = job.weight();
            if !(weight.is_finite() && weight > 0.0 && weight <= max_weight) {
                return Err(OrchestratorError::InvalidWeight {
                    job: job.summary().to_string(),
                    weight,
                    max_weight,
                });
            }
        }

        info!(jobs = jobs.len(), max_weight, "starting run");

        let mut handles = Vec::with_capacity(jobs.len());
        for job in jobs {
            let summary = job.summary().to_string();
            let weight = job.weight();
            let handle = if job.has_started_externally() {
                info!(job = %summary, "outputs already present or in progress; not launching");
                tokio::spawn(watch_external(
                    job,
                    self.options.poll_interval,
                    self.options.stall_warning,
                ))
            } else if job.spec().dependency.is_none() {
                let ticket = self.budget.enqueue();
                tokio::spawn(admit_and_run(job, ticket))
            } else {
                let budget = Arc::clone(&self.budget);
                let stall_warning = self.options.stall_warning;
                tokio::spawn(async move {
                    if let Some(dep) = &job.spec().dependency {
                        debug!(job = %job.summary(), "waiting on dependency");
                        dep.wait_logged(stall_warning, job.summary()).await;
                    }
                    let ticket = budget.enqueue();
                    admit_and_run(job, ticket).await
                })
            };
            handles.push((summary, weight, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (summary, weight, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    error!(job = %summary, error = %join_err, "job task panicked");
                    JobOutcome {
                        summary,
                        weight,
                        state: JobState::Failed,
                        ran_here: true,
                        result: None,
                        error: Some(join_err.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let report = RunReport {
            outcomes,
            peak_weight: self.budget.peak_weight(),
        };
        info!(
            completed = report.completed().count(),
            failed = report.failed().count(),
            peak_weight = report.peak_weight,
            "run finished"
        );
        Ok(report)
    }
}

/// Someone else owns this job's execution: poll its outputs until done.
///
/// Warns every `stall_warning` while the outputs stay incomplete; a results
/// directory left behind by a crashed run looks exactly like this.
async fn watch_external(
    job: Arc<dyn Job>,
    poll_interval: Duration,
    stall_warning: Duration,
) -> JobOutcome {
    let summary = job.summary().to_string();
    let started = Instant::now();
    let mut next_warning = stall_warning;
    let mut checks = 0u64;
    while !job.is_completed() {
        checks += 1;
        debug!(job = %summary, checks, "external job not complete yet");

        let waited = started.elapsed();
        if waited >= next_warning {
            warn!(
                job = %summary,
                waited = ?waited,
                path = ?job.watched_path(),
                "outputs started elsewhere are still incomplete; \
                 if that run crashed, remove them to rerun this job"
            );
            next_warning += stall_warning;
        }
        tokio::time::sleep(poll_interval).await;
    }
    info!(job = %summary, state = %JobState::Completed, "external job complete");

    JobOutcome {
        summary,
        weight: job.weight(),
        state: JobState::Completed,
        ran_here: false,
        result: job.completion().value(),
        error: None,
    }
}

async fn admit_and_run(job: Arc<dyn Job>, ticket: AdmissionTicket) -> JobOutcome {
    let summary = job.summary().to_string();
    let weight = job.weight();

    let permit = ticket.admit(weight).await;
    info!(job = %summary, weight, state = %JobState::Admitted, "job admitted");

    let result = job.run().await;
    drop(permit);

    let (state, error) = match result {
        Ok(()) if job.is_completed() => (JobState::Completed, None),
        Ok(()) => {
            warn!(
                job = %summary,
                "job finished without its expected outputs; dependents will not start"
            );
            (
                JobState::Failed,
                Some("finished without expected outputs".to_string()),
            )
        }
        Err(err) => {
            error!(job = %summary, error = %err, "job failed");
            (JobState::Failed, Some(err.to_string()))
        }
    };
    if state == JobState::Completed {
        info!(job = %summary, "job completed");
    }

    JobOutcome {
        summary,
        weight,
        state,
        ran_here: true,
        result: job.completion().value(),
        error,
    }
}
