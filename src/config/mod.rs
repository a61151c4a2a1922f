// src/config/mod.rs

//! Pipeline file loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a pipeline file from disk and settle the weight budget (`loader.rs`).
//! - Validate jobs and their dependency chain (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    DEFAULT_MAX_WEIGHT, MAX_WEIGHT_ENV, effective_max_weight, load_and_validate, load_from_path,
};
pub use model::{ConfigFile, ConfigSection, DefaultSection, JobConfig, RawConfigFile};
