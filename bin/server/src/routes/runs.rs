//! Run routes: manual triggering, webhook triggering, and inspection.

use crate::db::workflow_run::RunRecord;
use crate::error::ApiError;
use crate::runner;
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use flowdeck_core::{WorkflowId, WorkflowRunId};
use flowdeck_workflow::definition::Workflow;
use flowdeck_workflow::trigger::TriggerConfig;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Header carrying the webhook shared secret.
const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// `POST /api/workflows/{id}/runs` — manual trigger.
///
/// The request body, if any, becomes the run input.
pub async fn start(
    State(state): State<Arc<AppState>>,
    Path(id): Path<WorkflowId>,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let workflow = load_enabled(&state, id).await?;
    workflow.validate()?;

    let trigger_id = workflow.triggers().first().map(|t| t.id);
    let input = parse_input(&body)?;

    let run_id = runner::launch(state, workflow, trigger_id, input).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "run_id": run_id })),
    ))
}

/// Query parameters for run listing.
#[derive(Debug, Deserialize)]
pub struct ListRunsParams {
    /// Maximum number of runs to return.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// `GET /api/workflows/{id}/runs`
pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(id): Path<WorkflowId>,
    Query(params): Query<ListRunsParams>,
) -> Result<Json<Vec<RunRecord>>, ApiError> {
    let limit = params.limit.clamp(1, 500);
    Ok(Json(state.runs.list_for_workflow(id, limit).await?))
}

/// `GET /api/runs/{id}`
pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<WorkflowRunId>,
) -> Result<Json<RunRecord>, ApiError> {
    let record = state.runs.find_by_id(id).await?.ok_or(ApiError::NotFound {
        resource: "run".to_string(),
    })?;
    Ok(Json(record))
}

/// `POST /hooks/{*path}` — webhook trigger.
///
/// Matches the path against webhook triggers of enabled workflows. When
/// the trigger declares a secret, the `x-webhook-secret` header must
/// match.
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let full_path = format!("/{path}");
    let input = parse_input(&body)?;

    for workflow in state.workflows.list_enabled().await? {
        for trigger in workflow.triggers() {
            let TriggerConfig::Webhook {
                path: trigger_path,
                secret,
            } = &trigger.config
            else {
                continue;
            };
            // Trigger paths are declared as "/hooks/..."; the route wildcard
            // has already consumed the "/hooks" prefix.
            let declared = trigger_path
                .strip_prefix("/hooks")
                .unwrap_or(trigger_path.as_str());
            if declared != full_path {
                continue;
            }

            if let Some(secret) = secret {
                let presented = headers
                    .get(WEBHOOK_SECRET_HEADER)
                    .and_then(|v| v.to_str().ok());
                if presented != Some(secret.as_str()) {
                    return Err(ApiError::BadRequest {
                        message: "webhook secret mismatch".to_string(),
                    });
                }
            }

            let trigger_id = Some(trigger.id);
            let run_id =
                runner::launch(state.clone(), workflow, trigger_id, input.clone()).await?;
            return Ok((
                StatusCode::ACCEPTED,
                Json(serde_json::json!({ "run_id": run_id })),
            ));
        }
    }

    Err(ApiError::NotFound {
        resource: "webhook".to_string(),
    })
}

/// Parses an optional JSON request body into the run input.
fn parse_input(body: &Bytes) -> Result<Option<JsonValue>, ApiError> {
    if body.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| ApiError::BadRequest {
            message: format!("run input must be valid JSON: {e}"),
        })
}

async fn load_enabled(state: &AppState, id: WorkflowId) -> Result<Workflow, ApiError> {
    let workflow = state
        .workflows
        .find_by_id(id)
        .await?
        .ok_or(ApiError::NotFound {
            resource: "workflow".to_string(),
        })?;

    if !workflow.metadata.enabled {
        return Err(ApiError::BadRequest {
            message: format!("workflow {id} is disabled"),
        });
    }
    Ok(workflow)
}
