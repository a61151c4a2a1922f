// src/scheduler/report.rs

use std::fmt;

use crate::types::JobState;

/// How a single job ended.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub summary: String,
    pub weight: f64,
    /// `Completed` or `Failed`.
    pub state: JobState,
    /// Whether this process did the work, as opposed to finding it done or
    /// in progress elsewhere.
    pub ran_here: bool,
    /// Value the job's completion future was resolved with.
    pub result: Option<String>,
    pub error: Option<String>,
}

/// Outcomes of one orchestration run, in submission order.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcomes: Vec<JobOutcome>,
    /// Highest total admitted weight during the run.
    pub peak_weight: f64,
}

impl RunReport {
    pub fn completed(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.state == JobState::Completed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| o.state == JobState::Failed)
    }

    pub fn all_completed(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn outcome(&self, summary: &str) -> Option<&JobOutcome> {
        self.outcomes.iter().find(|o| o.summary == summary)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "jobs ({}), peak weight {}:", self.outcomes.len(), self.peak_weight)?;
        for o in &self.outcomes {
            let origin = if o.ran_here { "ran here" } else { "found done" };
            write!(f, "  - {:<10} {} ({origin})", o.state.to_string(), o.summary)?;
            if let Some(result) = &o.result {
                write!(f, " -> {result}")?;
            }
            if let Some(err) = &o.error {
                write!(f, " [error: {err}]")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
