// src/pipeline/mod.rs

//! Turning a validated pipeline file into wired-up jobs.
//!
//! - [`order`] computes the submission order (predecessors first).
//! - [`builder`] constructs each job and hands dependents their
//!   predecessor's completion future.

pub mod builder;
pub mod order;

pub use builder::PipelineBuilder;
pub use order::submission_order;
