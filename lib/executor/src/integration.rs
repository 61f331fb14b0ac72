//! Integration node executor.
//!
//! The credential-resolution path of workflow execution: look up the
//! connection, rate-limit it, resolve its credential through the
//! refresh-on-read service, and dispatch the operation to the registered
//! connector.

use crate::context::ExecutionContext;
use crate::interpolate::resolve_json;
use flowdeck_integration::{
    Connector, ConnectorRegistry, OperationRequest, RateLimiter, ResolvedAuth,
};
use flowdeck_oauth::{ConnectionStore, TokenRefreshError, TokenRefreshService};
use flowdeck_workflow::node::IntegrationNodeConfig;
use flowdeck_workflow::worker::NodeExecutionError;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Dependencies for integration execution.
pub struct IntegrationDeps {
    /// Connection lookup.
    pub connections: Arc<dyn ConnectionStore>,
    /// Refresh-on-read credential resolution.
    pub refresher: Arc<TokenRefreshService>,
    /// Registered connectors by integration kind.
    pub connectors: ConnectorRegistry,
    /// Per-connection rate limiting.
    pub rate_limiter: Arc<RateLimiter>,
}

/// Executes an integration node.
pub async fn execute_integration(
    deps: &IntegrationDeps,
    ctx: &ExecutionContext,
    config: &IntegrationNodeConfig,
) -> Result<JsonValue, NodeExecutionError> {
    let connection = deps
        .connections
        .get(config.connection_id)
        .await
        .map_err(|e| NodeExecutionError::CredentialError {
            message: e.to_string(),
        })?;

    let Some(credential_id) = connection.credential_id else {
        return Err(NodeExecutionError::CredentialError {
            message: format!(
                "connection {} is not connected (status: {:?})",
                connection.id, connection.status
            ),
        });
    };

    let rate = deps.rate_limiter.check(connection.id);
    if !rate.is_allowed() {
        return Err(NodeExecutionError::ExternalServiceError {
            service: config.integration_kind.clone(),
            message: format!("rate limited for connection {}", connection.id),
        });
    }

    let credential = deps
        .refresher
        .resolve(credential_id, &connection.provider)
        .await
        .map_err(|e| match e {
            TokenRefreshError::NeedsReauthorization { credential_id } => {
                NodeExecutionError::CredentialError {
                    message: format!("credential {credential_id} requires re-authorization"),
                }
            }
            other => NodeExecutionError::CredentialError {
                message: other.to_string(),
            },
        })?;

    let connector = deps.connectors.get(&config.integration_kind).ok_or_else(|| {
        NodeExecutionError::UnsupportedNodeType {
            node_type: format!("integration:{}", config.integration_kind),
        }
    })?;

    let parameters = resolve_json(ctx, &config.parameters).map_err(|e| {
        NodeExecutionError::UnresolvedReference {
            message: e.to_string(),
        }
    })?;

    let request = OperationRequest::new(config.operation.clone(), parameters)
        .with_auth(ResolvedAuth::from_credential(&credential));

    let outcome = connector.execute(request).await.map_err(|e| {
        NodeExecutionError::ExternalServiceError {
            service: config.integration_kind.clone(),
            message: e.to_string(),
        }
    })?;

    tracing::debug!(
        connection = %connection.id,
        kind = %config.integration_kind,
        operation = %config.operation,
        latency_ms = outcome.latency_ms,
        "integration operation completed"
    );

    Ok(outcome.data)
}
