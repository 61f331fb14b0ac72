//! Remaining work graph for workflow execution.
//!
//! Execution scheduling uses a "remaining work graph":
//! - Start with the full workflow graph
//! - Remove nodes that have completed or been skipped
//! - Failed nodes get a self-edge (never become ready, block downstream)
//! - Nodes with 0 incoming edges are ready for execution
//! - When no node has 0 incoming edges AND nothing is executing, the run
//!   can make no further progress and is complete

use crate::graph::WorkflowGraph;
use crate::node::NodeId;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// The remaining work graph tracks which nodes still need to execute.
///
/// This is a simplified view of the workflow graph that:
/// - Excludes completed/skipped nodes
/// - Marks failed nodes with self-edges (blocking)
/// - Provides efficient lookup of ready nodes
#[derive(Debug, Clone)]
pub struct RemainingWorkGraph {
    /// The simplified graph for tracking dependencies.
    /// Node weights are NodeIds, edge weights are ().
    graph: DiGraph<NodeId, ()>,
    /// Map from NodeId to graph index for O(1) lookup.
    node_to_index: HashMap<NodeId, NodeIndex>,
    /// Nodes that are currently executing.
    executing: HashSet<NodeId>,
    /// Nodes that have failed (have self-edges, block downstream).
    failed: HashSet<NodeId>,
}

impl RemainingWorkGraph {
    /// Creates a new remaining work graph from a workflow graph.
    ///
    /// Initially all nodes are pending and included in the graph.
    #[must_use]
    pub fn from_workflow(workflow_graph: &WorkflowGraph) -> Self {
        let mut graph = DiGraph::new();
        let mut node_to_index = HashMap::new();

        for node in workflow_graph.nodes() {
            let idx = graph.add_node(node.id);
            node_to_index.insert(node.id, idx);
        }

        for node in workflow_graph.nodes() {
            let source_idx = node_to_index[&node.id];
            for (successor, _edge) in workflow_graph.successors(node.id) {
                let target_idx = node_to_index[&successor.id];
                graph.add_edge(source_idx, target_idx, ());
            }
        }

        Self {
            graph,
            node_to_index,
            executing: HashSet::new(),
            failed: HashSet::new(),
        }
    }

    /// Marks a node as currently executing.
    ///
    /// The node must still be in the remaining work graph.
    pub fn mark_executing(&mut self, node_id: NodeId) {
        if self.node_to_index.contains_key(&node_id) {
            self.executing.insert(node_id);
        }
    }

    /// Marks a node as completed and removes it from the graph.
    ///
    /// This unblocks downstream nodes that were waiting for this node.
    pub fn mark_completed(&mut self, node_id: NodeId) {
        self.executing.remove(&node_id);
        if let Some(idx) = self.node_to_index.remove(&node_id) {
            self.graph.remove_node(idx);
            // Removal invalidates indices
            self.rebuild_index_map();
        }
    }

    /// Marks a node as failed.
    ///
    /// Failed nodes get a self-edge so they never become ready and block
    /// all downstream nodes.
    pub fn mark_failed(&mut self, node_id: NodeId) {
        self.executing.remove(&node_id);
        if let Some(&idx) = self.node_to_index.get(&node_id) {
            self.graph.add_edge(idx, idx, ());
            self.failed.insert(node_id);
        }
    }

    /// Marks a node as skipped and removes it from the graph.
    ///
    /// Skipped nodes are treated like completed nodes: they unblock
    /// downstream.
    pub fn mark_skipped(&mut self, node_id: NodeId) {
        self.mark_completed(node_id);
    }

    /// Returns nodes that are ready to execute.
    ///
    /// A node is ready when it has 0 incoming edges in the remaining work
    /// graph and is not already executing.
    #[must_use]
    pub fn ready_nodes(&self) -> Vec<NodeId> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .edges_directed(idx, Direction::Incoming)
                    .count()
                    == 0
            })
            .filter_map(|idx| self.graph.node_weight(idx).copied())
            .filter(|node_id| !self.executing.contains(node_id))
            .collect()
    }

    /// Returns true if the node is still pending in this graph.
    #[must_use]
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.node_to_index.contains_key(&node_id)
    }

    /// Returns the number of remaining (non-terminal) nodes.
    #[must_use]
    pub fn remaining_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns true if no further progress can be made.
    ///
    /// That is: nothing is ready, and nothing is executing. An empty graph
    /// is trivially complete; a graph where only failed nodes (and their
    /// descendants) remain is complete-with-failures.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.executing.is_empty() && self.ready_nodes().is_empty()
    }

    /// Returns true if any node has failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Returns the set of failed nodes.
    #[must_use]
    pub fn failed_nodes(&self) -> &HashSet<NodeId> {
        &self.failed
    }

    /// Rebuilds the index map after node removal.
    fn rebuild_index_map(&mut self) {
        self.node_to_index.clear();
        for index in self.graph.node_indices() {
            if let Some(&node_id) = self.graph.node_weight(index) {
                self.node_to_index.insert(node_id, index);
            }
        }
    }
}
