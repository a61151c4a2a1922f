// src/scheduler/mod.rs

//! Admission-controlled job runner.
//!
//! - [`budget`] holds the shared weight budget and its FIFO admission queue.
//! - [`manager`] drives each job through its lifecycle.
//! - [`report`] is what a finished run hands back.

pub mod budget;
pub mod manager;
pub mod report;

pub use budget::{AdmissionPermit, AdmissionTicket, WeightBudget};
pub use manager::{ManagerOptions, TaskManager};
pub use report::{JobOutcome, RunReport};
