//! Shared application state and wiring.

use crate::config::ServerConfig;
use crate::crypto::Crypto;
use crate::db::{
    ConnectionRepository, SqlCredentialVault, SqlDataStore, WorkflowRepository,
    WorkflowRunRepository,
};
use crate::error::ApiError;
use flowdeck_ai::{AnthropicBackend, LlmBackend, LlmError, LlmRequest, LlmResponse};
use flowdeck_executor::Dispatcher;
use flowdeck_integration::{ConnectorRegistry, CredentialVault, RestConnector, RestOperation};
use flowdeck_oauth::{OAuthService, ProviderRegistry, TokenRefreshService};
use flowdeck_workflow::memory::InMemoryEventStore;
use flowdeck_workflow::nats::{NatsConfig, create_nats_stores};
use flowdeck_workflow::orchestrator::EventStore;
use flowdeck_workflow::worker::{InMemoryObjectStore, ObjectStore};
use sqlx::PgPool;
use std::sync::Arc;

/// Shared state behind every handler.
pub struct AppState {
    /// Workflow definitions.
    pub workflows: WorkflowRepository,
    /// Workflow runs and node executions.
    pub runs: WorkflowRunRepository,
    /// Connections.
    pub connections: ConnectionRepository,
    /// Credential vault (encrypted at rest).
    pub vault: Arc<dyn CredentialVault>,
    /// OAuth service (holds the CSRF state store).
    pub oauth: Arc<OAuthService>,
    /// Refresh-on-read credential resolution.
    pub refresher: Arc<TokenRefreshService>,
    /// Registered connectors.
    pub connectors: ConnectorRegistry,
    /// The node executor.
    pub executor: Arc<Dispatcher>,
    /// Execution event store.
    pub event_store: Arc<dyn EventStore>,
    /// Node output store.
    pub object_store: Arc<dyn ObjectStore>,
    /// Browser redirect after OAuth callbacks, when configured.
    pub ui_redirect_url: Option<String>,
}

impl AppState {
    /// Assembles the full application state from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the vault key, OAuth configuration, or NATS
    /// connection is invalid.
    pub async fn build(config: &ServerConfig, pool: PgPool) -> Result<Arc<Self>, ApiError> {
        let crypto = Crypto::new(&config.vault.master_key)?;
        let vault: Arc<dyn CredentialVault> =
            Arc::new(SqlCredentialVault::new(pool.clone(), crypto));

        let mut registry = ProviderRegistry::builtin();
        registry.merge(config.oauth.extra_providers.clone());

        let oauth = Arc::new(OAuthService::new(
            registry,
            config.oauth.providers.clone(),
            config.oauth.redirect_url.clone(),
        )?);
        let refresher = Arc::new(TokenRefreshService::new(oauth.clone(), vault.clone()));

        let connections = ConnectionRepository::new(pool.clone());
        let connectors = default_connectors();

        let llm: Arc<dyn LlmBackend> = match &config.llm {
            Some(settings) => {
                let mut backend =
                    AnthropicBackend::new(settings.api_key.clone(), settings.model.clone());
                if let Some(base_url) = &settings.base_url {
                    backend = backend.with_base_url(base_url.clone());
                }
                Arc::new(backend)
            }
            None => Arc::new(UnconfiguredLlm),
        };

        let (event_store, object_store): (Arc<dyn EventStore>, Arc<dyn ObjectStore>) =
            match &config.nats_url {
                Some(url) => {
                    let (events, objects) = create_nats_stores(&NatsConfig::new(url))
                        .await
                        .map_err(|e| ApiError::Internal {
                            message: e.to_string(),
                        })?;
                    (Arc::new(events), Arc::new(objects))
                }
                None => {
                    tracing::info!("no NATS configured, using in-memory execution stores");
                    (
                        Arc::new(InMemoryEventStore::new()),
                        Arc::new(InMemoryObjectStore::new()),
                    )
                }
            };

        let executor = Arc::new(Dispatcher::new(
            llm,
            Arc::new(connections.clone()),
            refresher.clone(),
            connectors.clone(),
            Arc::new(SqlDataStore::new(pool.clone())),
        ));

        Ok(Arc::new(Self {
            workflows: WorkflowRepository::new(pool.clone()),
            runs: WorkflowRunRepository::new(pool.clone()),
            connections,
            vault,
            oauth,
            refresher,
            connectors,
            executor,
            event_store,
            object_store,
            ui_redirect_url: config.oauth.ui_redirect_url.clone(),
        }))
    }
}

/// Built-in connectors for fixed-endpoint REST integrations.
fn default_connectors() -> ConnectorRegistry {
    let mut registry = ConnectorRegistry::new();

    registry.register(Arc::new(
        RestConnector::new("slack", "Slack", "https://slack.com/api")
            .with_operation(
                "post_message",
                RestOperation::new(
                    reqwest::Method::POST,
                    "/chat.postMessage",
                    "Posts a message to a channel",
                ),
            )
            .with_operation(
                "list_channels",
                RestOperation::new(
                    reqwest::Method::GET,
                    "/conversations.list",
                    "Lists channels in the workspace",
                ),
            ),
    ));

    registry.register(Arc::new(
        RestConnector::new("notion", "Notion", "https://api.notion.com")
            .with_operation(
                "create_page",
                RestOperation::new(reqwest::Method::POST, "/v1/pages", "Creates a page"),
            )
            .with_operation(
                "search",
                RestOperation::new(
                    reqwest::Method::POST,
                    "/v1/search",
                    "Searches pages and databases",
                ),
            ),
    ));

    registry
}

/// Backend used when no LLM is configured; fails loudly at execution time.
struct UnconfiguredLlm;

#[async_trait::async_trait]
impl LlmBackend for UnconfiguredLlm {
    async fn generate(&self, _request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        Err(LlmError::InvalidConfig {
            reason: "no LLM backend configured (set LLM__API_KEY)".to_string(),
        })
    }

    fn model(&self) -> &str {
        "unconfigured"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_connectors_registered() {
        let registry = default_connectors();
        assert_eq!(registry.kinds(), vec!["notion", "slack"]);
    }

    #[tokio::test]
    async fn unconfigured_llm_fails_loudly() {
        let backend = UnconfiguredLlm;
        let result = backend.generate(&LlmRequest::new("hi")).await;
        assert!(matches!(result, Err(LlmError::InvalidConfig { .. })));
    }
}
