//! In-process run driver.
//!
//! Launches a run: queues it through the orchestrator (events land in the
//! configured event store for audit and replay), then drives execution in
//! a background task, processing each scheduled work item with the
//! dispatcher and folding results back until no progress remains. The
//! final state is persisted to the runs table.

use crate::error::ApiError;
use crate::state::AppState;
use flowdeck_core::{TriggerId, WorkflowRunId};
use flowdeck_workflow::Workflow;
use flowdeck_workflow::orchestrator::{Orchestrator, WorkItemResult};
use flowdeck_workflow::worker::{ObjectStore, Worker};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Queues a run and spawns the execution task.
///
/// Returns the run ID immediately; progress is observable through the runs
/// API.
///
/// # Errors
///
/// Returns an error if queueing or the initial persistence fails.
pub async fn launch(
    state: Arc<AppState>,
    workflow: Workflow,
    trigger_id: Option<TriggerId>,
    input: Option<JsonValue>,
) -> Result<WorkflowRunId, ApiError> {
    let mut orchestrator = Orchestrator::new(workflow.clone(), state.event_store.clone());
    let run_id = orchestrator.queue(trigger_id, input.clone()).await?;

    state
        .runs
        .insert_queued(run_id, workflow.id, trigger_id, input.as_ref())
        .await?;

    tokio::spawn(async move {
        if let Err(e) = drive(state, workflow, orchestrator, run_id).await {
            tracing::error!(%run_id, error = %e, "run driver failed");
        }
    });

    Ok(run_id)
}

/// Drives a run to completion and persists the outcome.
async fn drive(
    state: Arc<AppState>,
    workflow: Workflow,
    mut orchestrator: Orchestrator<Arc<dyn flowdeck_workflow::orchestrator::EventStore>>,
    run_id: WorkflowRunId,
) -> Result<(), ApiError> {
    let worker = Worker::new(state.object_store.clone(), state.executor.clone());

    orchestrator.start().await?;

    loop {
        let items = orchestrator.pending_work();
        if items.is_empty() {
            break;
        }

        for item in items {
            let result = match workflow.graph.get_node(item.node_id) {
                Some(node) => worker.process(item, node).await,
                None => WorkItemResult::Failed {
                    run_id: item.run_id,
                    node_id: item.node_id,
                    error: format!("node {} not found in workflow graph", item.node_id),
                },
            };
            orchestrator.handle_result(result).await?;
        }
    }

    let run_state = orchestrator.state().ok_or(ApiError::Internal {
        message: "run driver lost orchestrator state".to_string(),
    })?;

    let output = match &run_state.output_key {
        Some(key) => {
            let bytes = state
                .object_store
                .get(key)
                .await
                .map_err(|e| ApiError::Internal {
                    message: format!("failed to resolve run output: {e}"),
                })?;
            Some(
                serde_json::from_slice(&bytes).map_err(|e| ApiError::Internal {
                    message: format!("run output is not valid JSON: {e}"),
                })?,
            )
        }
        None => None,
    };

    tracing::info!(
        %run_id,
        state = ?run_state.execution_state,
        "run finished"
    );

    state
        .runs
        .finalize(
            run_id,
            run_state.execution_state,
            run_state.started_at,
            run_state.finished_at,
            output.as_ref(),
            run_state.error.as_deref(),
        )
        .await?;
    state
        .runs
        .record_node_executions(run_state.node_states.values())
        .await?;

    Ok(())
}
