//! Task dependency graph used to refuse cycle-closing links.
//!
//! # Edge Direction
//!
//! An edge `A → B` means "A blocks B": B depends on A. A dependency row
//! `(task_id = B, depends_on_task_id = A)` becomes the edge `A → B`, so
//! adding "B depends on A" closes a cycle exactly when A is already
//! reachable from B.

use std::collections::HashMap;

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use ratify_core::model::project::TaskDependency;

/// Directed blocker → blocked graph over task ids.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Build the graph from the current dependency rows.
    #[must_use]
    pub fn from_dependencies<'a>(edges: impl IntoIterator<Item = &'a TaskDependency>) -> Self {
        let mut graph = Self::default();
        for edge in edges {
            graph.add(edge);
        }
        graph
    }

    fn node(&mut self, id: &str) -> NodeIndex {
        if let Some(idx) = self.node_map.get(id) {
            return *idx;
        }
        let idx = self.graph.add_node(id.to_string());
        self.node_map.insert(id.to_string(), idx);
        idx
    }

    /// Record an edge without checking it.
    pub fn add(&mut self, dependency: &TaskDependency) {
        let blocker = self.node(&dependency.depends_on_task_id);
        let blocked = self.node(&dependency.task_id);
        if !self.graph.contains_edge(blocker, blocked) {
            self.graph.add_edge(blocker, blocked, ());
        }
    }

    /// Drop an edge if present.
    pub fn remove(&mut self, dependency: &TaskDependency) {
        let (Some(blocker), Some(blocked)) = (
            self.node_map.get(&dependency.depends_on_task_id),
            self.node_map.get(&dependency.task_id),
        ) else {
            return;
        };
        if let Some(edge) = self.graph.find_edge(*blocker, *blocked) {
            self.graph.remove_edge(edge);
        }
    }

    /// Whether recording `dependency` would create a cycle.
    ///
    /// A self-dependency always does. An edge that already exists does not
    /// create a new one.
    #[must_use]
    pub fn would_create_cycle(&self, dependency: &TaskDependency) -> bool {
        if dependency.task_id == dependency.depends_on_task_id {
            return true;
        }
        let (Some(blocker), Some(blocked)) = (
            self.node_map.get(&dependency.depends_on_task_id),
            self.node_map.get(&dependency.task_id),
        ) else {
            return false;
        };
        if self.graph.contains_edge(*blocker, *blocked) {
            return false;
        }
        has_path_connecting(&self.graph, *blocked, *blocker, None)
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(task: &str, on: &str) -> TaskDependency {
        TaskDependency {
            task_id: task.into(),
            depends_on_task_id: on.into(),
        }
    }

    #[test]
    fn chain_closure_is_a_cycle() {
        let edges = [dep("b", "a"), dep("c", "b")];
        let graph = DependencyGraph::from_dependencies(&edges);
        assert!(graph.would_create_cycle(&dep("a", "c")));
        assert!(!graph.would_create_cycle(&dep("d", "c")));
        assert!(!graph.would_create_cycle(&dep("c", "a")));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let graph = DependencyGraph::default();
        assert!(graph.would_create_cycle(&dep("a", "a")));
    }

    #[test]
    fn existing_edge_is_not_new_cycle() {
        let edges = [dep("b", "a")];
        let graph = DependencyGraph::from_dependencies(&edges);
        assert!(!graph.would_create_cycle(&dep("b", "a")));
    }

    #[test]
    fn removed_edge_no_longer_blocks() {
        let edges = [dep("b", "a"), dep("c", "b")];
        let mut graph = DependencyGraph::from_dependencies(&edges);
        graph.remove(&dep("c", "b"));
        assert_eq!(graph.edge_count(), 1);
        assert!(!graph.would_create_cycle(&dep("a", "c")));
    }
}
