// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::JobKind;

/// Pipeline file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// max_weight = 2.0
///
/// [default]
/// program = "CMD.exe"
/// database = ["/db/human.xml"]
/// spectra = ["/raw/a.raw", "/raw/b.raw"]
///
/// [job.calibrate]
/// kind = "calibration"
/// tasks = ["Task1-CalibrateTask.toml"]
/// output_dir = "/out/calibration"
///
/// [job.search]
/// kind = "library-search"
/// after = "calibrate"
/// tasks = ["Task2-SearchTask.toml"]
/// output_dir = "/out/search"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub default: DefaultSection,

    /// All jobs from `[job.<name>]`, keyed by name.
    #[serde(default)]
    pub job: BTreeMap<String, JobConfig>,
}

/// Validated pipeline file. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub default: DefaultSection,
    pub job: BTreeMap<String, JobConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        default: DefaultSection,
        job: BTreeMap<String, JobConfig>,
    ) -> Self {
        Self {
            config,
            default,
            job,
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Total weight allowed to run at once. Overridden by the CLI flag and
    /// the `MSRUNNER_MAX_WEIGHT` environment variable.
    #[serde(default)]
    pub max_weight: Option<f64>,

    /// Seconds between completion checks on jobs running elsewhere.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Seconds between warnings about a job still waiting on its dependency.
    #[serde(default = "default_stall_warning_secs")]
    pub stall_warning_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_stall_warning_secs() -> u64 {
    600
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            max_weight: None,
            poll_interval_secs: default_poll_interval_secs(),
            stall_warning_secs: default_stall_warning_secs(),
        }
    }
}

impl ConfigSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn stall_warning(&self) -> Duration {
        Duration::from_secs(self.stall_warning_secs)
    }
}

/// `[default]` section: values jobs inherit unless they set their own.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DefaultSection {
    #[serde(default)]
    pub program: Option<String>,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    #[serde(default)]
    pub database: Vec<PathBuf>,

    #[serde(default)]
    pub spectra: Vec<PathBuf>,

    /// Weight of jobs that do not declare one; `1.0` if unset.
    #[serde(default)]
    pub weight: Option<f64>,
}

/// `[job.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub kind: JobKind,

    /// Text used in logs; defaults to `<name> (<kind>)`.
    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub weight: Option<f64>,

    #[serde(default)]
    pub program: Option<String>,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Name of the single job this one waits for.
    #[serde(default)]
    pub after: Option<String>,

    /// Flag placed before the dependency's result on the command line.
    #[serde(default)]
    pub dependency_flag: Option<String>,

    /// Task definition files passed with `-t`.
    #[serde(default)]
    pub tasks: Vec<PathBuf>,

    #[serde(default)]
    pub spectra: Option<Vec<PathBuf>>,

    #[serde(default)]
    pub database: Option<Vec<PathBuf>>,

    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Where under `output_dir` the stage's result files land.
    #[serde(default)]
    pub results_subdir: Option<PathBuf>,

    /// Artifact written by in-process tasks.
    #[serde(default)]
    pub output_file: Option<PathBuf>,

    /// `psm-summary` only.
    #[serde(default)]
    pub q_value_cutoff: Option<f64>,

    /// `merge-tables` only: file-name pattern of the tables to merge
    /// (default `*.tsv`).
    #[serde(default)]
    pub pattern: Option<String>,
}

impl JobConfig {
    pub fn effective_summary(&self, name: &str) -> String {
        self.summary
            .clone()
            .unwrap_or_else(|| format!("{name} ({})", self.kind))
    }

    pub fn effective_weight(&self, defaults: &DefaultSection) -> f64 {
        self.weight.or(defaults.weight).unwrap_or(1.0)
    }

    pub fn effective_program(&self, defaults: &DefaultSection) -> Option<String> {
        self.program.clone().or_else(|| defaults.program.clone())
    }

    pub fn effective_working_dir(&self, defaults: &DefaultSection) -> PathBuf {
        self.working_dir
            .clone()
            .or_else(|| defaults.working_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn effective_spectra(&self, defaults: &DefaultSection) -> Vec<PathBuf> {
        self.spectra
            .clone()
            .unwrap_or_else(|| defaults.spectra.clone())
    }

    pub fn effective_database(&self, defaults: &DefaultSection) -> Vec<PathBuf> {
        self.database
            .clone()
            .unwrap_or_else(|| defaults.database.clone())
    }

    /// Default q-value cutoff for PSM summaries.
    pub fn effective_q_value_cutoff(&self) -> f64 {
        self.q_value_cutoff.unwrap_or(0.01)
    }

    /// `output_dir`, joined with `results_subdir` when set.
    pub fn results_dir(&self) -> Option<PathBuf> {
        let output_dir = self.output_dir.as_ref()?;
        Some(match &self.results_subdir {
            Some(sub) => output_dir.join(sub),
            None => output_dir.clone(),
        })
    }

    pub fn effective_pattern(&self) -> &str {
        self.pattern.as_deref().unwrap_or("*.tsv")
    }
}
