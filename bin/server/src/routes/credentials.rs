//! Credential routes.
//!
//! Secret material is write-only: create accepts it, reads return
//! metadata only.

use crate::error::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use flowdeck_core::{ConnectionId, CredentialId};
use flowdeck_integration::{Credential, CredentialData, CredentialVault};
use serde::Deserialize;
use std::sync::Arc;

/// Payload for creating a credential.
#[derive(Debug, Deserialize)]
pub struct CreateCredentialRequest {
    /// The connection this credential belongs to.
    pub connection_id: ConnectionId,
    /// Display name.
    pub name: String,
    /// The secret material (stored encrypted, never returned).
    pub data: CredentialData,
}

/// `POST /api/credentials`
///
/// Stores the credential and, when its connection is still pending (an
/// API-key style connection with no OAuth flow), marks the connection
/// connected.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateCredentialRequest>,
) -> Result<(StatusCode, Json<Credential>), ApiError> {
    let mut connection = state
        .connections
        .find_by_id(request.connection_id)
        .await?
        .ok_or(ApiError::NotFound {
            resource: "connection".to_string(),
        })?;

    let credential = Credential::new(request.connection_id, request.name, request.data.kind());
    let metadata = credential.clone();
    state.vault.store(credential, request.data).await?;

    if connection.credential_id.is_none() {
        connection.mark_connected(metadata.id);
        state.connections.update(&connection).await?;
    }

    Ok((StatusCode::CREATED, Json(metadata)))
}

/// Query parameters for credential listing.
#[derive(Debug, Deserialize)]
pub struct ListCredentialsParams {
    /// The connection to list credentials for.
    pub connection_id: ConnectionId,
}

/// `GET /api/credentials?connection_id=...`
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListCredentialsParams>,
) -> Result<Json<Vec<Credential>>, ApiError> {
    Ok(Json(
        state
            .vault
            .list_for_connection(params.connection_id)
            .await?,
    ))
}

/// `GET /api/credentials/{id}` — metadata only.
pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<CredentialId>,
) -> Result<Json<Credential>, ApiError> {
    Ok(Json(state.vault.get_metadata(id).await?))
}

/// `DELETE /api/credentials/{id}`
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<CredentialId>,
) -> Result<StatusCode, ApiError> {
    state.vault.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
