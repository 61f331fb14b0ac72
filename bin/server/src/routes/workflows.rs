//! Workflow CRUD and validation routes.

use crate::error::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use flowdeck_core::WorkflowId;
use flowdeck_workflow::definition::{Workflow, WorkflowMetadata};
use flowdeck_workflow::graph::WorkflowGraph;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Payload for creating or replacing a workflow.
#[derive(Debug, Deserialize)]
pub struct WorkflowRequest {
    /// Workflow name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Tags for filtering.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Whether the workflow is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// The graph (nodes and edges).
    pub graph: WorkflowGraph,
    /// Static variables.
    #[serde(default)]
    pub variables: BTreeMap<String, JsonValue>,
}

fn default_enabled() -> bool {
    true
}

impl WorkflowRequest {
    fn into_workflow(self, id: WorkflowId, created: Option<&WorkflowMetadata>) -> Workflow {
        let mut metadata = WorkflowMetadata::new(self.name);
        metadata.description = self.description;
        metadata.tags = self.tags;
        metadata.enabled = self.enabled;
        if let Some(existing) = created {
            metadata.created_at = existing.created_at;
            metadata.version = existing.version.clone();
        }

        let mut graph = self.graph;
        graph.rebuild_index_map();

        Workflow {
            id,
            metadata,
            graph,
            variables: self.variables,
        }
    }
}

/// `GET /api/workflows`
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Workflow>>, ApiError> {
    Ok(Json(state.workflows.list().await?))
}

/// `POST /api/workflows`
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WorkflowRequest>,
) -> Result<(StatusCode, Json<Workflow>), ApiError> {
    let workflow = request.into_workflow(WorkflowId::new(), None);
    workflow.validate()?;

    state.workflows.insert(&workflow).await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

/// `GET /api/workflows/{id}`
pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<WorkflowId>,
) -> Result<Json<Workflow>, ApiError> {
    let workflow = state
        .workflows
        .find_by_id(id)
        .await?
        .ok_or(ApiError::NotFound {
            resource: "workflow".to_string(),
        })?;
    Ok(Json(workflow))
}

/// `PUT /api/workflows/{id}`
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<WorkflowId>,
    Json(request): Json<WorkflowRequest>,
) -> Result<Json<Workflow>, ApiError> {
    let existing = state
        .workflows
        .find_by_id(id)
        .await?
        .ok_or(ApiError::NotFound {
            resource: "workflow".to_string(),
        })?;

    let workflow = request.into_workflow(id, Some(&existing.metadata));
    workflow.validate()?;

    state.workflows.update(&workflow).await?;
    Ok(Json(workflow))
}

/// `DELETE /api/workflows/{id}`
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<WorkflowId>,
) -> Result<StatusCode, ApiError> {
    if state.workflows.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound {
            resource: "workflow".to_string(),
        })
    }
}

/// `POST /api/workflows/{id}/validate`
///
/// Validates the stored definition and reports the result without
/// changing anything.
pub async fn validate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<WorkflowId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let workflow = state
        .workflows
        .find_by_id(id)
        .await?
        .ok_or(ApiError::NotFound {
            resource: "workflow".to_string(),
        })?;

    match workflow.validate() {
        Ok(()) => Ok(Json(serde_json::json!({ "valid": true }))),
        Err(e) => Ok(Json(serde_json::json!({
            "valid": false,
            "error": e.to_string(),
        }))),
    }
}
