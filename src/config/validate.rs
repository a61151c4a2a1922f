// src/config/validate.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, JobConfig, RawConfigFile};
use crate::errors::{OrchestratorError, Result};
use crate::job::oracle::FilePattern;
use crate::types::JobKind;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = OrchestratorError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.default, raw.job))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_jobs(cfg)?;
    validate_global_config(cfg)?;
    for (name, job) in cfg.job.iter() {
        validate_weight(cfg, name, job)?;
        validate_job_fields(cfg, name, job)?;
    }
    validate_results_dirs(cfg)?;
    validate_dependencies(cfg)?;
    validate_chain(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> OrchestratorError {
    OrchestratorError::ConfigError(msg.into())
}

fn ensure_has_jobs(cfg: &RawConfigFile) -> Result<()> {
    if cfg.job.is_empty() {
        return Err(config_error(
            "pipeline must contain at least one [job.<name>] section",
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if let Some(max) = cfg.config.max_weight {
        if !(max.is_finite() && max > 0.0) {
            return Err(config_error(format!(
                "[config].max_weight must be > 0 (got {max})"
            )));
        }
    }
    if cfg.config.poll_interval_secs == 0 {
        return Err(config_error("[config].poll_interval_secs must be >= 1 (got 0)"));
    }
    if cfg.config.stall_warning_secs == 0 {
        return Err(config_error("[config].stall_warning_secs must be >= 1 (got 0)"));
    }
    Ok(())
}

fn validate_weight(cfg: &RawConfigFile, name: &str, job: &JobConfig) -> Result<()> {
    let weight = job.effective_weight(&cfg.default);
    if !(weight.is_finite() && weight > 0.0) {
        return Err(config_error(format!(
            "job '{name}' must have a positive weight (got {weight})"
        )));
    }
    if let Some(max) = cfg.config.max_weight {
        if weight > max {
            return Err(OrchestratorError::InvalidWeight {
                job: name.to_string(),
                weight,
                max_weight: max,
            });
        }
    }
    Ok(())
}

fn validate_job_fields(cfg: &RawConfigFile, name: &str, job: &JobConfig) -> Result<()> {
    if job.kind.is_external() {
        if job.effective_program(&cfg.default).is_none() {
            return Err(config_error(format!(
                "job '{name}' needs a `program` (or [default].program)"
            )));
        }
        if job.effective_spectra(&cfg.default).is_empty() {
            return Err(config_error(format!(
                "job '{name}' needs at least one spectra file"
            )));
        }
        if job.output_dir.is_none() {
            return Err(config_error(format!("job '{name}' needs an `output_dir`")));
        }
        return Ok(());
    }

    if job.output_file.is_none() {
        return Err(config_error(format!("job '{name}' needs an `output_file`")));
    }
    match job.kind {
        JobKind::PsmSummary => {
            let cutoff = job.effective_q_value_cutoff();
            if !(0.0..=1.0).contains(&cutoff) {
                return Err(config_error(format!(
                    "job '{name}': q_value_cutoff must be within 0..=1 (got {cutoff})"
                )));
            }
        }
        JobKind::MergeTables => {
            FilePattern::new(job.effective_pattern())
                .map_err(|e| config_error(format!("job '{name}': {e:#}")))?;
        }
        _ => {}
    }
    Ok(())
}

/// Completion is read from each job's results directory, so two external
/// jobs must never share one.
fn validate_results_dirs(cfg: &RawConfigFile) -> Result<()> {
    let mut owners: BTreeMap<PathBuf, &str> = BTreeMap::new();
    for (name, job) in cfg.job.iter().filter(|(_, j)| j.kind.is_external()) {
        let Some(dir) = job.results_dir() else {
            continue;
        };
        if let Some(other) = owners.insert(dir.clone(), name.as_str()) {
            return Err(config_error(format!(
                "jobs '{other}' and '{name}' both write results to {}; \
                 give them distinct `output_dir` or `results_subdir` values",
                dir.display()
            )));
        }
    }
    Ok(())
}

fn validate_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, job) in cfg.job.iter() {
        if let Some(dep) = job.after.as_deref() {
            if dep == name {
                return Err(config_error(format!(
                    "job '{name}' cannot depend on itself in `after`"
                )));
            }
            if !cfg.job.contains_key(dep) {
                return Err(config_error(format!(
                    "job '{name}' has unknown dependency '{dep}' in `after`"
                )));
            }
        }
    }
    Ok(())
}

/// Edge direction: predecessor -> dependent.
pub(crate) fn dependency_graph(jobs: &BTreeMap<String, JobConfig>) -> DiGraphMap<&str, ()> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for name in jobs.keys() {
        graph.add_node(name.as_str());
    }
    for (name, job) in jobs.iter() {
        if let Some(dep) = job.after.as_deref() {
            graph.add_edge(dep, name.as_str(), ());
        }
    }
    graph
}

fn validate_chain(cfg: &RawConfigFile) -> Result<()> {
    let graph = dependency_graph(&cfg.job);
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(OrchestratorError::DependencyCycle(format!(
            "cycle detected in job dependencies involving job '{}'",
            cycle.node_id()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(toml_src)?;
        ConfigFile::try_from(raw)
    }

    const BASE: &str = r#"
[default]
program = "CMD.exe"
spectra = ["a.raw", "b.raw"]
"#;

    #[test]
    fn accepts_a_calibration_to_search_chain() {
        let cfg = parse(&format!(
            r#"{BASE}
[job.calib]
kind = "calibration"
output_dir = "out/calib"

[job.search]
kind = "search"
after = "calib"
output_dir = "out/search"
weight = 0.5
"#
        ))
        .unwrap();
        assert_eq!(cfg.job.len(), 2);
        assert_eq!(cfg.job["search"].after.as_deref(), Some("calib"));
    }

    #[test]
    fn external_jobs_need_an_output_dir() {
        let err = parse(&format!("{BASE}\n[job.calib]\nkind = \"calibration\"\n")).unwrap_err();
        assert!(matches!(err, OrchestratorError::ConfigError(msg) if msg.contains("output_dir")));
    }

    #[test]
    fn self_dependency_is_rejected() {
        let err = parse(&format!(
            "{BASE}\n[job.a]\nkind = \"search\"\noutput_dir = \"o\"\nafter = \"a\"\n"
        ))
        .unwrap_err();
        assert!(matches!(err, OrchestratorError::ConfigError(msg) if msg.contains("itself")));
    }

    #[test]
    fn weight_over_configured_budget_is_rejected() {
        let err = parse(&format!(
            "[config]\nmax_weight = 1.5\n{BASE}\n\
             [job.a]\nkind = \"search\"\noutput_dir = \"o\"\nweight = 2.0\n"
        ))
        .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidWeight { weight, .. } if weight == 2.0));
    }

    #[test]
    fn shared_output_dir_needs_distinct_results_subdirs() {
        let shared = format!(
            "{BASE}\n[job.calib]\nkind = \"calibration\"\noutput_dir = \"/out\"\n\
             [job.search]\nkind = \"search\"\noutput_dir = \"/out\"\n"
        );
        let err = parse(&shared).unwrap_err();
        assert!(matches!(err, OrchestratorError::ConfigError(msg) if msg.contains("/out")));

        let split = format!(
            "{BASE}\n[job.calib]\nkind = \"calibration\"\noutput_dir = \"/out\"\n\
             results_subdir = \"Task1\"\n\
             [job.search]\nkind = \"search\"\noutput_dir = \"/out\"\n\
             results_subdir = \"Task2\"\n"
        );
        assert!(parse(&split).is_ok());
    }

    #[test]
    fn merge_tables_needs_a_valid_pattern() {
        let err = parse(
            "[job.m]\nkind = \"merge-tables\"\noutput_file = \"m.tsv\"\npattern = \"[\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, OrchestratorError::ConfigError(msg) if msg.contains("job 'm'")));
    }

    #[test]
    fn unknown_kind_fails_to_parse() {
        let err = parse("[job.x]\nkind = \"gptmd-only\"\n").unwrap_err();
        assert!(matches!(err, OrchestratorError::TomlError(_)));
    }
}
