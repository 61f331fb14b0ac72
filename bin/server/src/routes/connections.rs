//! Connection routes and the OAuth callback.

use crate::error::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use flowdeck_core::ConnectionId;
use flowdeck_integration::{Credential, CredentialData, CredentialKind, CredentialVault};
use flowdeck_oauth::Connection;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Payload for creating a connection.
#[derive(Debug, Deserialize)]
pub struct CreateConnectionRequest {
    /// Display name.
    pub name: String,
    /// Provider key (e.g., "google") for OAuth connections, or an
    /// integration kind for API-key connections.
    pub provider: String,
    /// Scope override for the authorization request.
    pub scopes: Option<Vec<String>>,
    /// When true, skip the OAuth flow; a credential is attached later via
    /// the credentials API.
    #[serde(default)]
    pub manual_credential: bool,
}

/// `POST /api/connections`
///
/// Creates a pending connection and, for OAuth providers, starts the
/// authorization flow. The response carries the URL to redirect the user
/// to.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateConnectionRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let connection = Connection::new(request.name, request.provider.clone());
    state.connections.insert(&connection).await?;

    if request.manual_credential {
        return Ok((
            StatusCode::CREATED,
            Json(json!({ "connection": connection, "authorize_url": null })),
        ));
    }

    let authorization =
        state
            .oauth
            .start_authorization(&request.provider, connection.id, request.scopes)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "connection": connection,
            "authorize_url": authorization.authorize_url,
        })),
    ))
}

/// `GET /api/connections`
pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Connection>>, ApiError> {
    Ok(Json(state.connections.list().await?))
}

/// `GET /api/connections/{id}`
pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ConnectionId>,
) -> Result<Json<Connection>, ApiError> {
    let connection = state
        .connections
        .find_by_id(id)
        .await?
        .ok_or(ApiError::NotFound {
            resource: "connection".to_string(),
        })?;
    Ok(Json(connection))
}

/// Query parameters delivered by the provider redirect.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    /// The CSRF state.
    pub state: Option<String>,
    /// The authorization code on success.
    pub code: Option<String>,
    /// Provider error code when the user denied (or the request failed).
    pub error: Option<String>,
}

/// `GET /oauth/callback`
///
/// Completes the authorization-code flow: validates the CSRF state,
/// exchanges the code, stores the token set encrypted, and marks the
/// connection connected.
pub async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    let Some(csrf_state) = params.state else {
        return Err(ApiError::BadRequest {
            message: "missing state parameter".to_string(),
        });
    };

    if let Some(provider_error) = params.error {
        // The user denied, or the provider rejected the request. Consume
        // the state and record the failure on the connection.
        if let Some(pending) = state.oauth.states().take(&csrf_state)
            && let Some(mut connection) =
                state.connections.find_by_id(pending.connection_id).await?
        {
            connection.mark_error(format!("authorization failed: {provider_error}"));
            state.connections.update(&connection).await?;
        }
        return Err(ApiError::BadRequest {
            message: format!("authorization failed: {provider_error}"),
        });
    }

    let Some(code) = params.code else {
        return Err(ApiError::BadRequest {
            message: "missing code parameter".to_string(),
        });
    };

    let (pending, tokens) = state.oauth.complete_authorization(&csrf_state, &code).await?;

    let mut connection = state
        .connections
        .find_by_id(pending.connection_id)
        .await?
        .ok_or(ApiError::NotFound {
            resource: "connection".to_string(),
        })?;

    let credential = Credential::new(
        connection.id,
        format!("{} tokens", connection.provider),
        CredentialKind::Oauth2,
    );
    let credential_id = credential.id;
    state
        .vault
        .store(credential, tokens.into_credential_data(None))
        .await?;

    connection.mark_connected(credential_id);
    state.connections.update(&connection).await?;

    tracing::info!(connection = %connection.id, provider = %connection.provider, "connection authorized");

    match &state.ui_redirect_url {
        Some(url) => Ok(Redirect::to(url).into_response()),
        None => Ok(Json(json!({
            "connection_id": connection.id,
            "status": connection.status,
        }))
        .into_response()),
    }
}

/// `POST /api/connections/{id}/refresh`
///
/// Forces a refresh-on-read of the connection's credential. A rejected
/// refresh token marks the connection as needing re-authorization.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ConnectionId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut connection = state
        .connections
        .find_by_id(id)
        .await?
        .ok_or(ApiError::NotFound {
            resource: "connection".to_string(),
        })?;

    let Some(credential_id) = connection.credential_id else {
        return Err(ApiError::BadRequest {
            message: format!("connection {id} has no credential"),
        });
    };

    match state
        .refresher
        .resolve(credential_id, &connection.provider)
        .await
    {
        Ok(data) => {
            connection.mark_used();
            state.connections.update(&connection).await?;

            let expires_at = match data {
                CredentialData::Oauth2 { expires_at, .. } => expires_at,
                _ => None,
            };
            Ok(Json(json!({
                "status": connection.status,
                "expires_at": expires_at,
            })))
        }
        Err(e) => {
            if matches!(
                e,
                flowdeck_oauth::TokenRefreshError::NeedsReauthorization { .. }
            ) {
                connection.mark_error("refresh token rejected, re-authorization required");
                state.connections.update(&connection).await?;
            }
            Err(e.into())
        }
    }
}

/// `DELETE /api/connections/{id}`
///
/// Revokes tokens best-effort, deletes the credential, and removes the
/// connection. Revocation failures never block the delete.
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ConnectionId>,
) -> Result<StatusCode, ApiError> {
    let connection = state
        .connections
        .find_by_id(id)
        .await?
        .ok_or(ApiError::NotFound {
            resource: "connection".to_string(),
        })?;

    if let Some(credential_id) = connection.credential_id {
        if let Ok(CredentialData::Oauth2 { access_token, .. }) =
            state.vault.get_data(credential_id).await
        {
            state
                .oauth
                .revoke(&connection.provider, &access_token)
                .await;
        }
        if let Err(e) = state.vault.delete(credential_id).await {
            tracing::warn!(connection = %id, error = %e, "failed to delete credential");
        }
    }

    state.connections.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
