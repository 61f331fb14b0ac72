//! Connector trait and related types.
//!
//! All integrations implement the Connector trait, providing a uniform
//! interface for the node executors. Credentials are resolved by the
//! caller (the integration executor refreshes OAuth tokens on demand) and
//! handed to the connector as already-usable auth material.

use crate::credential::CredentialData;
use crate::error::ConnectorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

/// Information about a connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorInfo {
    /// The integration kind this connector serves (e.g., "slack").
    pub kind: String,
    /// Human-readable name.
    pub name: String,
    /// Description of the connector.
    pub description: String,
    /// Available operations.
    pub operations: Vec<OperationInfo>,
}

/// Information about an available operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationInfo {
    /// Operation name.
    pub name: String,
    /// Description of what the operation does.
    pub description: String,
}

/// Auth material resolved from a credential, ready to apply to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAuth {
    /// `Authorization: Bearer <token>`.
    Bearer { token: String },
    /// API key, either in a named header or as a bearer token.
    ApiKey {
        key: String,
        header_name: Option<String>,
    },
    /// HTTP basic auth.
    Basic { username: String, password: String },
}

impl ResolvedAuth {
    /// Builds auth material from credential data.
    ///
    /// OAuth2 credentials resolve to their access token; callers are
    /// responsible for refreshing expired tokens first.
    #[must_use]
    pub fn from_credential(data: &CredentialData) -> Self {
        match data {
            CredentialData::Oauth2 { access_token, .. } => Self::Bearer {
                token: access_token.clone(),
            },
            CredentialData::ApiKey { key, header_name } => Self::ApiKey {
                key: key.clone(),
                header_name: header_name.clone(),
            },
            CredentialData::BasicAuth { username, password } => Self::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            CredentialData::BearerToken { token } => Self::Bearer {
                token: token.clone(),
            },
        }
    }
}

/// An operation request.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    /// The operation name.
    pub operation: String,
    /// Operation parameters.
    pub parameters: JsonValue,
    /// Resolved auth material, if the connector call is authenticated.
    pub auth: Option<ResolvedAuth>,
}

impl OperationRequest {
    /// Creates a new unauthenticated operation request.
    #[must_use]
    pub fn new(operation: impl Into<String>, parameters: JsonValue) -> Self {
        Self {
            operation: operation.into(),
            parameters,
            auth: None,
        }
    }

    /// Attaches resolved auth material.
    #[must_use]
    pub fn with_auth(mut self, auth: ResolvedAuth) -> Self {
        self.auth = Some(auth);
        self
    }
}

/// The outcome of a successful operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationOutcome {
    /// Output data.
    pub data: JsonValue,
    /// Latency in milliseconds.
    pub latency_ms: u64,
    /// HTTP status, when the operation went over HTTP.
    pub status: Option<u16>,
}

/// Trait for integration connectors.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Returns information about this connector.
    fn info(&self) -> ConnectorInfo;

    /// Executes an operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails.
    async fn execute(&self, request: OperationRequest)
    -> Result<OperationOutcome, ConnectorError>;

    /// Checks if the service is reachable.
    async fn health_check(&self) -> Result<bool, ConnectorError>;

    /// Checks if this connector supports the named operation.
    fn supports(&self, operation: &str) -> bool {
        self.info().operations.iter().any(|op| op.name == operation)
    }
}

/// Registry mapping integration kinds to connectors.
#[derive(Default, Clone)]
pub struct ConnectorRegistry {
    connectors: HashMap<String, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connector under its declared kind.
    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        self.connectors.insert(connector.info().kind, connector);
    }

    /// Returns the connector for an integration kind.
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<Arc<dyn Connector>> {
        self.connectors.get(kind).cloned()
    }

    /// Returns the registered integration kinds, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.connectors.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubConnector;

    #[async_trait]
    impl Connector for StubConnector {
        fn info(&self) -> ConnectorInfo {
            ConnectorInfo {
                kind: "stub".to_string(),
                name: "Stub".to_string(),
                description: "Test connector".to_string(),
                operations: vec![OperationInfo {
                    name: "echo".to_string(),
                    description: "Echoes parameters".to_string(),
                }],
            }
        }

        async fn execute(
            &self,
            request: OperationRequest,
        ) -> Result<OperationOutcome, ConnectorError> {
            Ok(OperationOutcome {
                data: request.parameters,
                latency_ms: 0,
                status: None,
            })
        }

        async fn health_check(&self) -> Result<bool, ConnectorError> {
            Ok(true)
        }
    }

    #[test]
    fn resolved_auth_from_oauth2() {
        let data = CredentialData::oauth2("tok_123");
        assert_eq!(
            ResolvedAuth::from_credential(&data),
            ResolvedAuth::Bearer {
                token: "tok_123".to_string()
            }
        );
    }

    #[test]
    fn resolved_auth_from_api_key() {
        let data = CredentialData::ApiKey {
            key: "key_1".to_string(),
            header_name: Some("X-Api-Key".to_string()),
        };
        match ResolvedAuth::from_credential(&data) {
            ResolvedAuth::ApiKey { key, header_name } => {
                assert_eq!(key, "key_1");
                assert_eq!(header_name.as_deref(), Some("X-Api-Key"));
            }
            other => panic!("unexpected auth: {other:?}"),
        }
    }

    #[test]
    fn connector_supports_operation() {
        let connector = StubConnector;
        assert!(connector.supports("echo"));
        assert!(!connector.supports("delete_everything"));
    }

    #[test]
    fn registry_lookup() {
        let mut registry = ConnectorRegistry::new();
        registry.register(Arc::new(StubConnector));

        assert!(registry.get("stub").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.kinds(), vec!["stub".to_string()]);
    }

    #[tokio::test]
    async fn stub_connector_echoes() {
        let connector = StubConnector;
        let outcome = connector
            .execute(OperationRequest::new(
                "echo",
                serde_json::json!({"hello": "world"}),
            ))
            .await
            .expect("execute");
        assert_eq!(outcome.data["hello"], "world");
    }
}
