//! Graph of resolved `template@version` nodes used to derive install order.
//!
//! Cycles are already cut while resolving (a template on the current ancestor
//! path is never followed again), so the graph built from a resolution is
//! acyclic. A graph assembled by hand may not be, and then has no order.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use crate::core::{EngineError, EngineResult};

/// Directed graph where an edge `a -> b` means "a depends on b".
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node if it is not present yet and return its index.
    pub fn ensure_node(&mut self, label: &str) -> NodeIndex {
        if let Some(&index) = self.node_map.get(label) {
            return index;
        }
        let index = self.graph.add_node(label.to_string());
        self.node_map.insert(label.to_string(), index);
        index
    }

    /// Record that `from` depends on `to`. Duplicate edges are ignored, so
    /// a diamond adds the shared node once.
    pub fn add_dependency(&mut self, from: &str, to: &str) {
        let from_idx = self.ensure_node(from);
        let to_idx = self.ensure_node(to);

        if !self.graph.contains_edge(from_idx, to_idx) {
            self.graph.add_edge(from_idx, to_idx, ());
        }
    }

    /// Node labels ordered so every dependency precedes its dependents.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CyclicDependency`] naming a node on the cycle.
    pub fn topological_order(&self) -> EngineResult<Vec<String>> {
        let indices = toposort(&self.graph, None).map_err(|cycle| EngineError::CyclicDependency {
            chain: self.graph[cycle.node_id()].clone(),
        })?;

        // toposort puts dependents first; install order wants the reverse.
        Ok(indices.into_iter().rev().map(|idx| self.graph[idx].clone()).collect())
    }
}
