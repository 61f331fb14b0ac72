//! Run state reconstruction from events.
//!
//! The event stream is the source of truth for run state. On crash
//! recovery, state is reconstructed by replaying events in order.
//!
//! This module provides:
//! - `RunState`: The complete state of a workflow run
//! - `RunStateBuilder`: Reconstructs state from an event stream

use crate::execution::{ExecutionEvent, ExecutionState, NodeExecution};
use crate::graph::WorkflowGraph;
use crate::node::NodeId;
use crate::remaining_work::RemainingWorkGraph;
use chrono::{DateTime, Utc};
use flowdeck_core::{TriggerId, WorkflowId, WorkflowRunId};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Complete state of a workflow run.
///
/// This structure holds all information needed to resume execution
/// after a crash or to report on a run's status.
#[derive(Debug, Clone)]
pub struct RunState {
    /// The run ID.
    pub run_id: WorkflowRunId,
    /// The workflow being executed.
    pub workflow_id: WorkflowId,
    /// The trigger that initiated this run, if any.
    pub trigger_id: Option<TriggerId>,
    /// Current execution state of the run.
    pub execution_state: ExecutionState,
    /// When the run was queued.
    pub queued_at: DateTime<Utc>,
    /// When the run started executing.
    pub started_at: Option<DateTime<Utc>>,
    /// When the run finished.
    pub finished_at: Option<DateTime<Utc>>,
    /// Input data that triggered the run.
    pub input: Option<JsonValue>,
    /// Object store key of the final output (if completed with output).
    pub output_key: Option<String>,
    /// Error message (if failed).
    pub error: Option<String>,
    /// Per-node execution state.
    pub node_states: HashMap<NodeId, NodeExecution>,
    /// The remaining work graph for scheduling.
    remaining_work: RemainingWorkGraph,
}

impl RunState {
    /// Returns nodes that are ready to execute.
    #[must_use]
    pub fn ready_nodes(&self) -> Vec<NodeId> {
        self.remaining_work.ready_nodes()
    }

    /// Returns true if the run is complete (terminal state or no more work).
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.execution_state.is_terminal() || self.remaining_work.is_complete()
    }

    /// Returns true if there are any failed nodes.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.remaining_work.has_failures()
    }

    /// Returns the remaining work graph for inspection.
    #[must_use]
    pub fn remaining_work(&self) -> &RemainingWorkGraph {
        &self.remaining_work
    }

    /// Marks a node as executing.
    pub fn mark_node_executing(&mut self, node_id: NodeId, input: Option<JsonValue>) {
        self.remaining_work.mark_executing(node_id);
        if let Some(node_exec) = self.node_states.get_mut(&node_id) {
            node_exec.start(input);
        }
    }

    /// Marks a node as completed.
    pub fn mark_node_completed(
        &mut self,
        node_id: NodeId,
        output_key: String,
        branch: Option<String>,
    ) {
        self.remaining_work.mark_completed(node_id);
        if let Some(node_exec) = self.node_states.get_mut(&node_id) {
            node_exec.complete(output_key, branch);
        }
    }

    /// Marks a node as failed.
    pub fn mark_node_failed(&mut self, node_id: NodeId, error: String) {
        self.remaining_work.mark_failed(node_id);
        if let Some(node_exec) = self.node_states.get_mut(&node_id) {
            node_exec.fail(error);
        }
    }

    /// Marks a node as skipped.
    pub fn mark_node_skipped(&mut self, node_id: NodeId) {
        self.remaining_work.mark_skipped(node_id);
        if let Some(node_exec) = self.node_states.get_mut(&node_id) {
            node_exec.skip();
        }
    }

    /// Finalizes the run as completed.
    pub fn complete(&mut self, output_key: Option<String>, timestamp: DateTime<Utc>) {
        self.execution_state = ExecutionState::Completed;
        self.finished_at = Some(timestamp);
        self.output_key = output_key;
    }

    /// Finalizes the run as failed.
    pub fn fail(&mut self, error: String, timestamp: DateTime<Utc>) {
        self.execution_state = ExecutionState::Failed;
        self.finished_at = Some(timestamp);
        self.error = Some(error);
    }

    /// Finalizes the run as cancelled.
    pub fn cancel(&mut self, timestamp: DateTime<Utc>) {
        self.execution_state = ExecutionState::Cancelled;
        self.finished_at = Some(timestamp);
    }
}

/// Errors from run state reconstruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStateError {
    /// The event stream was empty.
    NoEvents,
    /// The first event was not RunQueued.
    MissingRunQueued,
}

impl std::fmt::Display for RunStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoEvents => write!(f, "event stream is empty"),
            Self::MissingRunQueued => write!(f, "first event must be run_queued"),
        }
    }
}

impl std::error::Error for RunStateError {}

/// Builder for reconstructing run state from events.
///
/// This implements event sourcing: the event stream is the source of truth,
/// and we rebuild state by replaying events in order.
pub struct RunStateBuilder {
    workflow_graph: WorkflowGraph,
}

impl RunStateBuilder {
    /// Creates a new builder with the given workflow graph.
    #[must_use]
    pub fn new(workflow_graph: WorkflowGraph) -> Self {
        Self { workflow_graph }
    }

    /// Reconstructs run state from a sequence of events.
    ///
    /// Events must be provided in order (earliest first).
    ///
    /// # Errors
    ///
    /// Returns an error if the event sequence is invalid (e.g., missing
    /// RunQueued).
    pub fn build_from_events(
        &self,
        events: impl IntoIterator<Item = ExecutionEvent>,
    ) -> Result<RunState, RunStateError> {
        let mut events_iter = events.into_iter();

        let first_event = events_iter.next().ok_or(RunStateError::NoEvents)?;

        let (run_id, workflow_id, trigger_id, input, queued_at) = match first_event {
            ExecutionEvent::RunQueued {
                run_id,
                workflow_id,
                trigger_id,
                input,
                timestamp,
            } => (run_id, workflow_id, trigger_id, input, timestamp),
            _ => return Err(RunStateError::MissingRunQueued),
        };

        let remaining_work = RemainingWorkGraph::from_workflow(&self.workflow_graph);

        let mut node_states = HashMap::new();
        for node in self.workflow_graph.nodes() {
            node_states.insert(node.id, NodeExecution::new(run_id, node.id));
        }

        let mut state = RunState {
            run_id,
            workflow_id,
            trigger_id,
            execution_state: ExecutionState::Queued,
            queued_at,
            started_at: None,
            finished_at: None,
            input,
            output_key: None,
            error: None,
            node_states,
            remaining_work,
        };

        for event in events_iter {
            Self::apply(&mut state, event);
        }

        Ok(state)
    }

    /// Applies a single event to the state.
    fn apply(state: &mut RunState, event: ExecutionEvent) {
        match event {
            ExecutionEvent::RunQueued { .. } => {
                // Duplicate RunQueued events are ignored during replay.
            }
            ExecutionEvent::RunStarted { timestamp, .. } => {
                state.execution_state = ExecutionState::Running;
                state.started_at = Some(timestamp);
            }
            ExecutionEvent::NodeStarted { node_id, input, .. } => {
                state.mark_node_executing(node_id, input);
            }
            ExecutionEvent::NodeCompleted {
                node_id,
                output_key,
                branch,
                ..
            } => {
                state.mark_node_completed(node_id, output_key, branch);
            }
            ExecutionEvent::NodeFailed { node_id, error, .. } => {
                state.mark_node_failed(node_id, error);
            }
            ExecutionEvent::NodeSkipped { node_id, .. } => {
                state.mark_node_skipped(node_id);
            }
            ExecutionEvent::RunCompleted {
                output_key,
                timestamp,
                ..
            } => {
                state.complete(output_key, timestamp);
            }
            ExecutionEvent::RunFailed {
                error, timestamp, ..
            } => {
                state.fail(error, timestamp);
            }
            ExecutionEvent::RunCancelled { timestamp, .. } => {
                state.cancel(timestamp);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Edge;
    use crate::execution::NodeExecutionState;
    use crate::node::{Node, NodeConfig, OutputConfig, TransformConfig, TriggerNodeConfig};

    fn linear_graph() -> (WorkflowGraph, [NodeId; 3]) {
        let mut graph = WorkflowGraph::new();
        let trigger = Node::new("Start", NodeConfig::Trigger(TriggerNodeConfig::Manual));
        let transform = Node::new(
            "Shape",
            NodeConfig::Transform(TransformConfig {
                template: serde_json::json!({}),
            }),
        );
        let output = Node::new(
            "Done",
            NodeConfig::Output(OutputConfig {
                template: serde_json::json!({}),
            }),
        );
        let ids = [trigger.id, transform.id, output.id];

        graph.add_node(trigger);
        graph.add_node(transform);
        graph.add_node(output);
        graph.add_edge(ids[0], ids[1], Edge::default_ports()).unwrap();
        graph.add_edge(ids[1], ids[2], Edge::default_ports()).unwrap();

        (graph, ids)
    }

    fn queued_event(run_id: WorkflowRunId, workflow_id: WorkflowId) -> ExecutionEvent {
        ExecutionEvent::RunQueued {
            run_id,
            workflow_id,
            trigger_id: None,
            input: Some(serde_json::json!({"name": "test"})),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn build_requires_events() {
        let (graph, _) = linear_graph();
        let builder = RunStateBuilder::new(graph);
        let result = builder.build_from_events(vec![]);
        assert_eq!(result.unwrap_err(), RunStateError::NoEvents);
    }

    #[test]
    fn build_requires_run_queued_first() {
        let (graph, _) = linear_graph();
        let builder = RunStateBuilder::new(graph);
        let result = builder.build_from_events(vec![ExecutionEvent::RunStarted {
            run_id: WorkflowRunId::new(),
            timestamp: Utc::now(),
        }]);
        assert_eq!(result.unwrap_err(), RunStateError::MissingRunQueued);
    }

    #[test]
    fn replay_reconstructs_progress() {
        let (graph, ids) = linear_graph();
        let run_id = WorkflowRunId::new();
        let workflow_id = WorkflowId::new();
        let now = Utc::now();

        let events = vec![
            queued_event(run_id, workflow_id),
            ExecutionEvent::RunStarted {
                run_id,
                timestamp: now,
            },
            ExecutionEvent::NodeStarted {
                run_id,
                node_id: ids[0],
                input: None,
                timestamp: now,
            },
            ExecutionEvent::NodeCompleted {
                run_id,
                node_id: ids[0],
                output_key: "out_1".to_string(),
                branch: None,
                timestamp: now,
            },
        ];

        let builder = RunStateBuilder::new(graph);
        let state = builder.build_from_events(events).expect("valid stream");

        assert_eq!(state.execution_state, ExecutionState::Running);
        assert_eq!(
            state.node_states[&ids[0]].state,
            NodeExecutionState::Completed
        );
        // The transform is now the only ready node.
        assert_eq!(state.ready_nodes(), vec![ids[1]]);
        assert!(!state.is_complete());
    }

    #[test]
    fn replay_reaches_terminal_state() {
        let (graph, ids) = linear_graph();
        let run_id = WorkflowRunId::new();
        let workflow_id = WorkflowId::new();
        let now = Utc::now();

        let mut events = vec![
            queued_event(run_id, workflow_id),
            ExecutionEvent::RunStarted {
                run_id,
                timestamp: now,
            },
        ];
        for (i, node_id) in ids.into_iter().enumerate() {
            events.push(ExecutionEvent::NodeCompleted {
                run_id,
                node_id,
                output_key: format!("out_{i}"),
                branch: None,
                timestamp: now,
            });
        }
        events.push(ExecutionEvent::RunCompleted {
            run_id,
            output_key: Some("out_2".to_string()),
            timestamp: now,
        });

        let builder = RunStateBuilder::new(graph);
        let state = builder.build_from_events(events).expect("valid stream");

        assert_eq!(state.execution_state, ExecutionState::Completed);
        assert_eq!(state.output_key.as_deref(), Some("out_2"));
        assert!(state.is_complete());
    }

    #[test]
    fn replay_applies_failure() {
        let (graph, ids) = linear_graph();
        let run_id = WorkflowRunId::new();
        let workflow_id = WorkflowId::new();
        let now = Utc::now();

        let events = vec![
            queued_event(run_id, workflow_id),
            ExecutionEvent::RunStarted {
                run_id,
                timestamp: now,
            },
            ExecutionEvent::NodeCompleted {
                run_id,
                node_id: ids[0],
                output_key: "out_0".to_string(),
                branch: None,
                timestamp: now,
            },
            ExecutionEvent::NodeFailed {
                run_id,
                node_id: ids[1],
                error: "boom".to_string(),
                timestamp: now,
            },
        ];

        let builder = RunStateBuilder::new(graph);
        let state = builder.build_from_events(events).expect("valid stream");

        assert!(state.has_failures());
        assert!(state.is_complete());
        assert_eq!(
            state.node_states[&ids[1]].error.as_deref(),
            Some("boom")
        );
    }
}
