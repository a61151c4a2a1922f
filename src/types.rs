use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Pipeline stage a configured job belongs to.
///
/// The first four kinds launch an external search-engine process; the rest
/// are in-process analysis tasks run through the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    Calibration,
    Averaging,
    Search,
    LibrarySearch,
    PsmSummary,
    MergeTables,
}

impl JobKind {
    /// Whether this kind spawns an external process.
    pub fn is_external(self) -> bool {
        matches!(
            self,
            JobKind::Calibration | JobKind::Averaging | JobKind::Search | JobKind::LibrarySearch
        )
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobKind::Calibration => "calibration",
            JobKind::Averaging => "averaging",
            JobKind::Search => "search",
            JobKind::LibrarySearch => "library-search",
            JobKind::PsmSummary => "psm-summary",
            JobKind::MergeTables => "merge-tables",
        };
        f.write_str(s)
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "calibration" => Ok(JobKind::Calibration),
            "averaging" => Ok(JobKind::Averaging),
            "search" => Ok(JobKind::Search),
            "library-search" => Ok(JobKind::LibrarySearch),
            "psm-summary" => Ok(JobKind::PsmSummary),
            "merge-tables" => Ok(JobKind::MergeTables),
            other => Err(format!("invalid job kind: {other}")),
        }
    }
}

/// Where a job is in its lifecycle, as seen by the scheduler.
///
/// `Pending -> (ExternallyActive | Admitted) -> Completed`, with `Failed`
/// as the terminal state for jobs whose work errored or whose outputs never
/// materialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Constructed, not yet evaluated.
    Pending,
    /// Someone else (a prior run, another machine) owns the execution; the
    /// scheduler only watches for its outputs and charges no weight.
    ExternallyActive,
    /// Holding its weight in the budget and doing work.
    Admitted,
    /// Outputs verified; completion future resolved.
    Completed,
    /// Work errored or finished without the expected outputs.
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::ExternallyActive => "externally-active",
            JobState::Admitted => "admitted",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}
