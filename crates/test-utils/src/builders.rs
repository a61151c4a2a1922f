#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use msrunner::config::{ConfigFile, ConfigSection, DefaultSection, JobConfig, RawConfigFile};
use msrunner::errors::Result;
use msrunner::scheduler::ManagerOptions;
use msrunner::types::JobKind;

/// Manager options with millisecond intervals, for tests.
pub fn fast_options() -> ManagerOptions {
    ManagerOptions {
        poll_interval: Duration::from_millis(10),
        stall_warning: Duration::from_millis(200),
        admission_poll: Duration::from_millis(5),
    }
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                default: DefaultSection::default(),
                job: BTreeMap::new(),
            },
        }
    }

    pub fn with_job(mut self, name: &str, job: JobConfig) -> Self {
        self.config.job.insert(name.to_string(), job);
        self
    }

    pub fn with_max_weight(mut self, max: f64) -> Self {
        self.config.config.max_weight = Some(max);
        self
    }

    pub fn with_default_program(mut self, program: &str) -> Self {
        self.config.default.program = Some(program.to_string());
        self
    }

    pub fn with_default_spectra(mut self, spectra: &[&str]) -> Self {
        self.config.default.spectra = spectra.iter().map(PathBuf::from).collect();
        self
    }

    pub fn with_default_database(mut self, db: &str) -> Self {
        self.config.default.database.push(PathBuf::from(db));
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `JobConfig`.
pub struct JobConfigBuilder {
    job: JobConfig,
}

impl JobConfigBuilder {
    pub fn new(kind: JobKind) -> Self {
        Self {
            job: JobConfig {
                kind,
                summary: None,
                weight: None,
                program: None,
                working_dir: None,
                after: None,
                dependency_flag: None,
                tasks: vec![],
                spectra: None,
                database: None,
                output_dir: None,
                results_subdir: None,
                output_file: None,
                q_value_cutoff: None,
                pattern: None,
            },
        }
    }

    pub fn summary(mut self, summary: &str) -> Self {
        self.job.summary = Some(summary.to_string());
        self
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.job.weight = Some(weight);
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.job.after = Some(dep.to_string());
        self
    }

    pub fn dependency_flag(mut self, flag: &str) -> Self {
        self.job.dependency_flag = Some(flag.to_string());
        self
    }

    pub fn task_file(mut self, path: &str) -> Self {
        self.job.tasks.push(PathBuf::from(path));
        self
    }

    pub fn output_dir(mut self, dir: &str) -> Self {
        self.job.output_dir = Some(PathBuf::from(dir));
        self
    }

    pub fn results_subdir(mut self, dir: &str) -> Self {
        self.job.results_subdir = Some(PathBuf::from(dir));
        self
    }

    pub fn output_file(mut self, file: &str) -> Self {
        self.job.output_file = Some(PathBuf::from(file));
        self
    }

    pub fn pattern(mut self, pattern: &str) -> Self {
        self.job.pattern = Some(pattern.to_string());
        self
    }

    pub fn build(self) -> JobConfig {
        self.job
    }
}
