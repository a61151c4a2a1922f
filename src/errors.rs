// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Dependency cycle: {0}")]
    DependencyCycle(String),

    #[error("no jobs to schedule")]
    EmptyJobList,

    #[error("job '{job}' has weight {weight}, which does not fit the budget of {max_weight}")]
    InvalidWeight {
        job: String,
        weight: f64,
        max_weight: f64,
    },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, OrchestratorError>;
