// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{OrchestratorError, Result};

/// Environment variable that sets the weight budget on a given machine.
pub const MAX_WEIGHT_ENV: &str = "MSRUNNER_MAX_WEIGHT";

/// Budget used when nothing else sets one: one standard job at a time.
pub const DEFAULT_MAX_WEIGHT: f64 = 1.0;

/// Read a pipeline file into a `RawConfigFile` (TOML only, no validation).
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Read and validate a pipeline file.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    ConfigFile::try_from(raw_config)
}

/// Settle the run's weight budget.
///
/// Priority: CLI flag, then the `MSRUNNER_MAX_WEIGHT` value (`env`), then
/// `[config].max_weight`, then [`DEFAULT_MAX_WEIGHT`]. The same pipeline file
/// can thus run with a different budget per machine.
pub fn effective_max_weight(cli: Option<f64>, env: Option<&str>, cfg: &ConfigFile) -> Result<f64> {
    let from_env = match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(raw.parse::<f64>().map_err(|_| {
            OrchestratorError::ConfigError(format!(
                "{MAX_WEIGHT_ENV} must be a number (got {raw:?})"
            ))
        })?),
        None => None,
    };

    let max = cli
        .or(from_env)
        .or(cfg.config.max_weight)
        .unwrap_or(DEFAULT_MAX_WEIGHT);

    if !(max.is_finite() && max > 0.0) {
        return Err(OrchestratorError::ConfigError(format!(
            "max weight must be a positive number (got {max})"
        )));
    }
    Ok(max)
}
