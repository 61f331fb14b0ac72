//! Workflow orchestrator for coordinating execution.
//!
//! One orchestrator per run. The orchestrator owns the graph logic:
//! 1. Load/reconstruct run state from events
//! 2. Determine ready nodes and publish work items for workers
//! 3. Fold completion/failure results back into the state
//! 4. Skip branches a conditional node did not take
//! 5. Finalize the run when no more progress can be made
//!
//! Workers own node execution; the two halves communicate only through the
//! `EventStore` so crash recovery is a replay of the event stream.

use crate::definition::Workflow;
use crate::envelope::Envelope;
use crate::execution::{ExecutionEvent, ExecutionState, NodeExecutionState};
use crate::node::{NodeId, NodeKind};
use crate::run_state::{RunState, RunStateBuilder, RunStateError};
use async_trait::async_trait;
use chrono::Utc;
use flowdeck_core::{TriggerId, WorkflowId, WorkflowRunId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};

/// A work item to be executed by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// The run this work item belongs to.
    pub run_id: WorkflowRunId,
    /// The workflow being executed.
    pub workflow_id: WorkflowId,
    /// The node to execute.
    pub node_id: NodeId,
    /// The run's trigger input.
    pub run_input: Option<JsonValue>,
    /// The workflow's static variables.
    #[serde(default)]
    pub variables: std::collections::BTreeMap<String, JsonValue>,
    /// Outputs of every node completed so far, as object store keys by
    /// node ID. Interpolation may reference any upstream node, so the
    /// full set is shipped, not just direct predecessors.
    pub inputs: HashMap<NodeId, String>,
}

/// Result of a work item execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkItemResult {
    /// Node executed successfully.
    Completed {
        /// The run ID.
        run_id: WorkflowRunId,
        /// The node ID.
        node_id: NodeId,
        /// Object store key for the output.
        output_key: String,
        /// Branch selected, when the node was a conditional.
        branch: Option<String>,
    },
    /// Node execution failed.
    Failed {
        /// The run ID.
        run_id: WorkflowRunId,
        /// The node ID.
        node_id: NodeId,
        /// Error message.
        error: String,
    },
}

/// Trait for event persistence and messaging.
///
/// This abstraction allows the orchestrator to be tested without NATS
/// while still supporting the JetStream implementation in production.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Publishes an event to the event stream.
    async fn publish(&self, event: Envelope<ExecutionEvent>) -> Result<(), EventStoreError>;

    /// Loads all events for a run.
    async fn load_events(
        &self,
        run_id: WorkflowRunId,
    ) -> Result<Vec<ExecutionEvent>, EventStoreError>;

    /// Publishes a work item for workers to process.
    async fn publish_work_item(&self, item: Envelope<WorkItem>) -> Result<(), EventStoreError>;
}

#[async_trait]
impl<T: EventStore + ?Sized> EventStore for std::sync::Arc<T> {
    async fn publish(&self, event: Envelope<ExecutionEvent>) -> Result<(), EventStoreError> {
        (**self).publish(event).await
    }

    async fn load_events(
        &self,
        run_id: WorkflowRunId,
    ) -> Result<Vec<ExecutionEvent>, EventStoreError> {
        (**self).load_events(run_id).await
    }

    async fn publish_work_item(&self, item: Envelope<WorkItem>) -> Result<(), EventStoreError> {
        (**self).publish_work_item(item).await
    }
}

/// Errors from event store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventStoreError {
    /// Failed to connect to the event store.
    ConnectionFailed { message: String },
    /// Failed to publish an event or work item.
    PublishFailed { message: String },
    /// Failed to load events.
    LoadFailed { message: String },
}

impl std::fmt::Display for EventStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionFailed { message } => {
                write!(f, "event store connection failed: {message}")
            }
            Self::PublishFailed { message } => write!(f, "event publish failed: {message}"),
            Self::LoadFailed { message } => write!(f, "event load failed: {message}"),
        }
    }
}

impl std::error::Error for EventStoreError {}

/// Errors that can occur during orchestration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    /// Event store error.
    EventStore(EventStoreError),
    /// Run state error.
    RunState(RunStateError),
    /// Run not found.
    RunNotFound { run_id: WorkflowRunId },
    /// Run already in terminal state.
    RunAlreadyTerminal { run_id: WorkflowRunId },
    /// The orchestrator has no active run.
    NotInitialized,
}

impl std::fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EventStore(e) => write!(f, "event store error: {e}"),
            Self::RunState(e) => write!(f, "run state error: {e}"),
            Self::RunNotFound { run_id } => write!(f, "run not found: {run_id}"),
            Self::RunAlreadyTerminal { run_id } => {
                write!(f, "run already in terminal state: {run_id}")
            }
            Self::NotInitialized => write!(f, "orchestrator has no active run"),
        }
    }
}

impl std::error::Error for OrchestratorError {}

impl From<EventStoreError> for OrchestratorError {
    fn from(e: EventStoreError) -> Self {
        Self::EventStore(e)
    }
}

impl From<RunStateError> for OrchestratorError {
    fn from(e: RunStateError) -> Self {
        Self::RunState(e)
    }
}

/// The workflow orchestrator.
///
/// Coordinates execution of a single workflow run.
pub struct Orchestrator<E: EventStore> {
    workflow: Workflow,
    event_store: E,
    state: Option<RunState>,
}

impl<E: EventStore> Orchestrator<E> {
    /// Creates a new orchestrator for the given workflow.
    pub fn new(workflow: Workflow, event_store: E) -> Self {
        Self {
            workflow,
            event_store,
            state: None,
        }
    }

    /// Queues a new run with the given trigger input.
    ///
    /// # Errors
    ///
    /// Returns an error if the RunQueued event cannot be published.
    pub async fn queue(
        &mut self,
        trigger_id: Option<TriggerId>,
        input: Option<JsonValue>,
    ) -> Result<WorkflowRunId, OrchestratorError> {
        let run_id = WorkflowRunId::new();
        let workflow_id = self.workflow.id;
        let timestamp = Utc::now();

        let event = ExecutionEvent::RunQueued {
            run_id,
            workflow_id,
            trigger_id,
            input,
            timestamp,
        };
        self.event_store
            .publish(Envelope::new(event.clone()))
            .await?;

        let builder = RunStateBuilder::new(self.workflow.graph.clone());
        let state = builder.build_from_events(vec![event])?;
        self.state = Some(state);

        Ok(run_id)
    }

    /// Resumes an existing run from its event stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the run has no events or already finished.
    pub async fn resume(&mut self, run_id: WorkflowRunId) -> Result<(), OrchestratorError> {
        let events = self.event_store.load_events(run_id).await?;
        if events.is_empty() {
            return Err(OrchestratorError::RunNotFound { run_id });
        }

        let builder = RunStateBuilder::new(self.workflow.graph.clone());
        let state = builder.build_from_events(events)?;

        if state.execution_state.is_terminal() {
            return Err(OrchestratorError::RunAlreadyTerminal { run_id });
        }

        self.state = Some(state);
        Ok(())
    }

    /// Starts execution of the run.
    ///
    /// Publishes RunStarted and schedules the initially ready nodes. Calling
    /// start on an already-running run only reschedules ready nodes.
    pub async fn start(&mut self) -> Result<(), OrchestratorError> {
        let state = self.state.as_mut().ok_or(OrchestratorError::NotInitialized)?;

        if state.execution_state == ExecutionState::Queued {
            let run_id = state.run_id;
            let timestamp = Utc::now();

            let event = ExecutionEvent::RunStarted { run_id, timestamp };
            self.event_store.publish(Envelope::new(event)).await?;
            state.execution_state = ExecutionState::Running;
            state.started_at = Some(timestamp);
        }

        self.schedule_ready_nodes().await
    }

    /// Handles a work item result (completion or failure).
    ///
    /// Folds the result into the run state, skips untaken branches, and
    /// either finalizes the run or schedules newly ready nodes.
    pub async fn handle_result(&mut self, result: WorkItemResult) -> Result<(), OrchestratorError> {
        let timestamp = Utc::now();

        match result {
            WorkItemResult::Completed {
                run_id,
                node_id,
                output_key,
                branch,
            } => {
                let event = ExecutionEvent::NodeCompleted {
                    run_id,
                    node_id,
                    output_key: output_key.clone(),
                    branch: branch.clone(),
                    timestamp,
                };
                self.event_store.publish(Envelope::new(event)).await?;

                let state = self.state.as_mut().ok_or(OrchestratorError::NotInitialized)?;
                state.mark_node_completed(node_id, output_key, branch.clone());

                let is_conditional = self
                    .workflow
                    .graph
                    .get_node(node_id)
                    .is_some_and(|n| n.kind() == NodeKind::Conditional);
                if is_conditional {
                    self.skip_untaken_branches(run_id, node_id, branch.as_deref())
                        .await?;
                }
            }
            WorkItemResult::Failed {
                run_id,
                node_id,
                error,
            } => {
                let event = ExecutionEvent::NodeFailed {
                    run_id,
                    node_id,
                    error: error.clone(),
                    timestamp,
                };
                self.event_store.publish(Envelope::new(event)).await?;

                let state = self.state.as_mut().ok_or(OrchestratorError::NotInitialized)?;
                state.mark_node_failed(node_id, error);
            }
        }

        let state = self.state.as_ref().ok_or(OrchestratorError::NotInitialized)?;
        if state.remaining_work().is_complete() {
            self.finalize_run().await
        } else {
            self.schedule_ready_nodes().await
        }
    }

    /// Returns the current run state.
    #[must_use]
    pub fn state(&self) -> Option<&RunState> {
        self.state.as_ref()
    }

    /// Returns work items for every node currently executing.
    ///
    /// Used by in-process drivers that execute work items directly instead
    /// of consuming the work queue.
    #[must_use]
    pub fn pending_work(&self) -> Vec<WorkItem> {
        let Some(state) = self.state.as_ref() else {
            return Vec::new();
        };
        let inputs = Self::collect_outputs(state);

        state
            .node_states
            .iter()
            .filter(|(_, exec)| exec.state == NodeExecutionState::Running)
            .map(|(node_id, _)| WorkItem {
                run_id: state.run_id,
                workflow_id: self.workflow.id,
                node_id: *node_id,
                run_input: state.input.clone(),
                variables: self.workflow.variables.clone(),
                inputs: inputs.clone(),
            })
            .collect()
    }

    /// Schedules all ready nodes for execution.
    async fn schedule_ready_nodes(&mut self) -> Result<(), OrchestratorError> {
        let (run_id, run_input, nodes_to_schedule) = {
            let state = self.state.as_ref().ok_or(OrchestratorError::NotInitialized)?;
            let run_id = state.run_id;
            let run_input = state.input.clone();

            let inputs = Self::collect_outputs(state);
            let nodes_to_schedule: Vec<(NodeId, HashMap<NodeId, String>)> = state
                .ready_nodes()
                .into_iter()
                .map(|node_id| (node_id, inputs.clone()))
                .collect();

            (run_id, run_input, nodes_to_schedule)
        };

        let timestamp = Utc::now();
        for (node_id, inputs) in nodes_to_schedule {
            let input_json = serde_json::to_value(
                inputs
                    .iter()
                    .map(|(id, key)| (id.to_string(), key.clone()))
                    .collect::<HashMap<_, _>>(),
            )
            .unwrap_or(JsonValue::Null);

            let event = ExecutionEvent::NodeStarted {
                run_id,
                node_id,
                input: Some(input_json.clone()),
                timestamp,
            };
            self.event_store.publish(Envelope::new(event)).await?;

            if let Some(state) = self.state.as_mut() {
                state.mark_node_executing(node_id, Some(input_json));
            }

            let work_item = WorkItem {
                run_id,
                workflow_id: self.workflow.id,
                node_id,
                run_input: run_input.clone(),
                variables: self.workflow.variables.clone(),
                inputs,
            };
            self.event_store
                .publish_work_item(Envelope::new(work_item))
                .await?;
        }

        Ok(())
    }

    /// Collects output keys of every node completed so far.
    fn collect_outputs(state: &RunState) -> HashMap<NodeId, String> {
        state
            .node_states
            .iter()
            .filter_map(|(node_id, exec)| {
                exec.output_key.as_ref().map(|key| (*node_id, key.clone()))
            })
            .collect()
    }

    /// Skips every node reachable only through branches the conditional did
    /// not take.
    ///
    /// A node is skipped when all of its incoming edges are dead: an edge is
    /// dead when it leaves the conditional through a non-selected port, or
    /// when its source node is itself skipped. Nodes fed by at least one
    /// live path keep running. Computed to a fixpoint; workflow graphs are
    /// small.
    async fn skip_untaken_branches(
        &mut self,
        run_id: WorkflowRunId,
        conditional_id: NodeId,
        selected: Option<&str>,
    ) -> Result<(), OrchestratorError> {
        let to_skip = {
            let state = self.state.as_ref().ok_or(OrchestratorError::NotInitialized)?;
            self.compute_branch_skips(state, conditional_id, selected)
        };

        let timestamp = Utc::now();
        let reason = match selected {
            Some(branch) => format!("branch '{branch}' taken"),
            None => "no branch matched".to_string(),
        };

        for node_id in to_skip {
            let event = ExecutionEvent::NodeSkipped {
                run_id,
                node_id,
                reason: reason.clone(),
                timestamp,
            };
            self.event_store.publish(Envelope::new(event)).await?;
            if let Some(state) = self.state.as_mut() {
                state.mark_node_skipped(node_id);
            }
        }

        Ok(())
    }

    /// Computes the set of nodes to skip after a conditional selected a
    /// branch (or none).
    fn compute_branch_skips(
        &self,
        state: &RunState,
        conditional_id: NodeId,
        selected: Option<&str>,
    ) -> Vec<NodeId> {
        let mut skipped: HashSet<NodeId> = HashSet::new();

        loop {
            let mut changed = false;

            for node in self.workflow.graph.nodes() {
                if skipped.contains(&node.id) {
                    continue;
                }
                // Only pending nodes can be skipped.
                let pending = state
                    .node_states
                    .get(&node.id)
                    .is_some_and(|e| e.state == NodeExecutionState::Pending);
                if !pending {
                    continue;
                }

                let predecessors = self.workflow.graph.predecessors(node.id);
                if predecessors.is_empty() {
                    continue;
                }

                let all_dead = predecessors.iter().all(|(pred, edge)| {
                    if pred.id == conditional_id {
                        return Some(edge.source_port.as_str()) != selected;
                    }
                    if skipped.contains(&pred.id) {
                        return true;
                    }
                    state
                        .node_states
                        .get(&pred.id)
                        .is_some_and(|e| e.state == NodeExecutionState::Skipped)
                });

                if all_dead {
                    skipped.insert(node.id);
                    changed = true;
                }
            }

            if !changed {
                break;
            }
        }

        let mut result: Vec<NodeId> = skipped.into_iter().collect();
        // Deterministic event order
        result.sort_by_key(|id| id.to_string());
        result
    }

    /// Finalizes the run (marks as completed or failed).
    ///
    /// On success the run output is the output of a completed `Output`
    /// node, when the workflow has one.
    async fn finalize_run(&mut self) -> Result<(), OrchestratorError> {
        let state = self.state.as_mut().ok_or(OrchestratorError::NotInitialized)?;

        if state.execution_state.is_terminal() {
            return Ok(());
        }

        let run_id = state.run_id;
        let timestamp = Utc::now();

        if state.has_failures() {
            let failed: Vec<String> = state
                .remaining_work()
                .failed_nodes()
                .iter()
                .map(ToString::to_string)
                .collect();
            let error = format!("workflow failed at node(s): {}", failed.join(", "));

            let event = ExecutionEvent::RunFailed {
                run_id,
                error: error.clone(),
                timestamp,
            };
            self.event_store.publish(Envelope::new(event)).await?;
            state.fail(error, timestamp);
        } else {
            let output_key = self
                .workflow
                .graph
                .nodes()
                .filter(|n| n.kind() == NodeKind::Output)
                .find_map(|n| {
                    state
                        .node_states
                        .get(&n.id)
                        .filter(|e| e.state == NodeExecutionState::Completed)
                        .and_then(|e| e.output_key.clone())
                });

            let event = ExecutionEvent::RunCompleted {
                run_id,
                output_key: output_key.clone(),
                timestamp,
            };
            self.event_store.publish(Envelope::new(event)).await?;
            state.complete(output_key, timestamp);
        }

        Ok(())
    }
}
