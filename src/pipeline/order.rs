// src/pipeline/order.rs

use petgraph::algo::toposort;

use crate::config::ConfigFile;
use crate::config::validate::dependency_graph;
use crate::errors::{OrchestratorError, Result};

/// Job names with every predecessor ahead of its dependents.
///
/// Among jobs with no ordering constraint, the order follows the order in
/// which they were added to the graph (alphabetical by name).
pub fn submission_order(cfg: &ConfigFile) -> Result<Vec<String>> {
    let graph = dependency_graph(&cfg.job);
    toposort(&graph, None)
        .map(|order| order.into_iter().map(str::to_string).collect())
        .map_err(|cycle| {
            OrchestratorError::DependencyCycle(format!(
                "cycle detected in job dependencies involving job '{}'",
                cycle.node_id()
            ))
        })
}
