//! Error types for the workflow crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `GraphError`: Low-level graph operations (nodes, ports, edges)
//! - `WorkflowError`: Definition-level operations (validation, triggers)
//!
//! Execution-side errors live next to the components that raise them
//! (`RunStateError`, `EventStoreError`, `WorkerError`).

use crate::node::NodeId;
use std::fmt;

/// Errors from graph operations.
///
/// These errors contain only information available at the graph layer.
/// Workflow-level context (like the workflow ID) is added by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Node with the given ID was not found in the graph.
    NodeNotFound { node_id: NodeId },
    /// Source port not found on node.
    SourcePortNotFound { node_id: NodeId, port_name: String },
    /// Target port not found on node.
    TargetPortNotFound { node_id: NodeId, port_name: String },
    /// Port schemas are incompatible.
    IncompatibleSchemas {
        source_node: NodeId,
        source_port: String,
        target_node: NodeId,
        target_port: String,
    },
    /// A required input port has no incoming edge.
    RequiredInputMissing { node_id: NodeId, port_name: String },
    /// The graph does not have exactly one trigger node.
    TriggerCount { count: usize },
    /// A trigger node has incoming edges.
    TriggerHasIncomingEdges { node_id: NodeId },
    /// Graph contains cycles.
    CycleDetected,
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeNotFound { node_id } => {
                write!(f, "node not found: {node_id}")
            }
            Self::SourcePortNotFound { node_id, port_name } => {
                write!(f, "source port '{port_name}' not found on node {node_id}")
            }
            Self::TargetPortNotFound { node_id, port_name } => {
                write!(f, "target port '{port_name}' not found on node {node_id}")
            }
            Self::IncompatibleSchemas {
                source_node,
                source_port,
                target_node,
                target_port,
            } => {
                write!(
                    f,
                    "incompatible schemas: {source_node}:{source_port} -> {target_node}:{target_port}"
                )
            }
            Self::RequiredInputMissing { node_id, port_name } => {
                write!(
                    f,
                    "required input port '{port_name}' on node {node_id} has no incoming edge"
                )
            }
            Self::TriggerCount { count } => {
                write!(f, "workflow must have exactly one trigger node, found {count}")
            }
            Self::TriggerHasIncomingEdges { node_id } => {
                write!(f, "trigger node {node_id} must not have incoming edges")
            }
            Self::CycleDetected => write!(f, "graph contains cycles"),
        }
    }
}

impl std::error::Error for GraphError {}

/// Errors from definition-level workflow operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// Graph validation failed.
    Graph(GraphError),
    /// A schedule trigger carries an invalid cron expression.
    InvalidCronExpression { expression: String, reason: String },
    /// A webhook trigger carries an invalid path.
    InvalidWebhookPath { path: String },
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graph(e) => write!(f, "graph validation failed: {e}"),
            Self::InvalidCronExpression { expression, reason } => {
                write!(f, "invalid cron expression '{expression}': {reason}")
            }
            Self::InvalidWebhookPath { path } => {
                write!(f, "invalid webhook path '{path}': must start with '/'")
            }
        }
    }
}

impl std::error::Error for WorkflowError {}

impl From<GraphError> for WorkflowError {
    fn from(e: GraphError) -> Self {
        Self::Graph(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_error_display() {
        let node_id = NodeId::new();
        let err = GraphError::RequiredInputMissing {
            node_id,
            port_name: "input".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("input"));
        assert!(msg.contains(&node_id.to_string()));
    }

    #[test]
    fn trigger_count_display() {
        let err = GraphError::TriggerCount { count: 2 };
        assert!(err.to_string().contains("exactly one trigger"));
    }

    #[test]
    fn workflow_error_wraps_graph_error() {
        let err: WorkflowError = GraphError::CycleDetected.into();
        assert!(err.to_string().contains("cycles"));
    }
}
