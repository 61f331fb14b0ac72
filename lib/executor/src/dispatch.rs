//! The dispatching `NodeExecutor`.
//!
//! One `Dispatcher` serves a deployment: it holds the HTTP client, the
//! LLM backend, the integration dependencies, and the data store, and
//! routes each node to its executor by configuration kind.

use crate::context::ExecutionContext;
use crate::control;
use crate::data_store::DataStore;
use crate::http::execute_http;
use crate::integration::{IntegrationDeps, execute_integration};
use crate::interpolate::{render_string, resolve_json};
use crate::llm::execute_llm;
use async_trait::async_trait;
use flowdeck_ai::LlmBackend;
use flowdeck_integration::{ConnectorRegistry, RateLimitConfig, RateLimiter, ResolvedAuth};
use flowdeck_oauth::{ConnectionStore, TokenRefreshService};
use flowdeck_workflow::node::{DataStoreNodeConfig, DataStoreOperation, DataStoreScope, Node, NodeConfig};
use flowdeck_workflow::worker::{NodeExecutionError, NodeExecutor, NodeInputs};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Scope string for globally-shared data store keys.
const GLOBAL_SCOPE: &str = "global";

/// Production node executor.
pub struct Dispatcher {
    http: reqwest::Client,
    llm: Arc<dyn LlmBackend>,
    integration: IntegrationDeps,
    data_store: Arc<dyn DataStore>,
}

impl Dispatcher {
    /// Creates a dispatcher with a default per-minute rate limit.
    #[must_use]
    pub fn new(
        llm: Arc<dyn LlmBackend>,
        connections: Arc<dyn ConnectionStore>,
        refresher: Arc<TokenRefreshService>,
        connectors: ConnectorRegistry,
        data_store: Arc<dyn DataStore>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            llm,
            integration: IntegrationDeps {
                connections,
                refresher,
                connectors,
                rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::default())),
            },
            data_store,
        }
    }

    /// Overrides the integration rate limiter.
    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.integration.rate_limiter = rate_limiter;
        self
    }

    /// Resolves the optional connection auth for an HTTP request node.
    async fn http_auth(
        &self,
        connection_id: Option<flowdeck_core::ConnectionId>,
    ) -> Result<Option<ResolvedAuth>, NodeExecutionError> {
        let Some(connection_id) = connection_id else {
            return Ok(None);
        };

        let connection = self
            .integration
            .connections
            .get(connection_id)
            .await
            .map_err(|e| NodeExecutionError::CredentialError {
                message: e.to_string(),
            })?;
        let Some(credential_id) = connection.credential_id else {
            return Err(NodeExecutionError::CredentialError {
                message: format!("connection {connection_id} is not connected"),
            });
        };

        let credential = self
            .integration
            .refresher
            .resolve(credential_id, &connection.provider)
            .await
            .map_err(|e| NodeExecutionError::CredentialError {
                message: e.to_string(),
            })?;

        Ok(Some(ResolvedAuth::from_credential(&credential)))
    }

    /// Executes a data store node.
    async fn execute_data_store(
        &self,
        ctx: &ExecutionContext,
        config: &DataStoreNodeConfig,
    ) -> Result<JsonValue, NodeExecutionError> {
        let key = render_string(ctx, &config.key).map_err(|e| {
            NodeExecutionError::UnresolvedReference {
                message: e.to_string(),
            }
        })?;
        let scope = match config.scope {
            DataStoreScope::Workflow => ctx.workflow_id().to_string(),
            DataStoreScope::Global => GLOBAL_SCOPE.to_string(),
        };

        let resolved_value = match &config.value {
            Some(value) => Some(resolve_json(ctx, value).map_err(|e| {
                NodeExecutionError::UnresolvedReference {
                    message: e.to_string(),
                }
            })?),
            None => None,
        };

        let storage_error = |e: crate::data_store::DataStoreError| NodeExecutionError::ExecutionFailed {
            message: e.to_string(),
        };

        match config.operation {
            DataStoreOperation::Get => {
                let value = self
                    .data_store
                    .get(&scope, &key)
                    .await
                    .map_err(storage_error)?;
                Ok(serde_json::json!({ "key": key, "value": value }))
            }
            DataStoreOperation::Set => {
                let value = resolved_value.ok_or_else(|| NodeExecutionError::InvalidInput {
                    message: "data_store set requires a value".to_string(),
                })?;
                self.data_store
                    .set(&scope, &key, value.clone())
                    .await
                    .map_err(storage_error)?;
                Ok(serde_json::json!({ "key": key, "value": value }))
            }
            DataStoreOperation::Delete => {
                let deleted = self
                    .data_store
                    .delete(&scope, &key)
                    .await
                    .map_err(storage_error)?;
                Ok(serde_json::json!({ "key": key, "deleted": deleted }))
            }
            DataStoreOperation::Append => {
                let value = resolved_value.ok_or_else(|| NodeExecutionError::InvalidInput {
                    message: "data_store append requires a value".to_string(),
                })?;
                let length = self
                    .data_store
                    .append(&scope, &key, value)
                    .await
                    .map_err(storage_error)?;
                Ok(serde_json::json!({ "key": key, "length": length }))
            }
        }
    }
}

#[async_trait]
impl NodeExecutor for Dispatcher {
    async fn execute(
        &self,
        node: &Node,
        inputs: NodeInputs,
    ) -> Result<JsonValue, NodeExecutionError> {
        let ctx = ExecutionContext::new(inputs);

        match &node.config {
            NodeConfig::Trigger(_) => Ok(control::execute_trigger(&ctx)),
            NodeConfig::HttpRequest(config) => {
                let auth = self.http_auth(config.connection_id).await?;
                execute_http(&self.http, &ctx, config, auth).await
            }
            NodeConfig::LlmCall(config) => execute_llm(self.llm.as_ref(), &ctx, config).await,
            NodeConfig::Integration(config) => {
                execute_integration(&self.integration, &ctx, config).await
            }
            NodeConfig::Conditional(config) => Ok(control::execute_conditional(&ctx, config)),
            NodeConfig::ForEach(config) => control::execute_for_each(&ctx, config),
            NodeConfig::Transform(config) => control::execute_transform(&ctx, config),
            NodeConfig::DataStore(config) => self.execute_data_store(&ctx, config).await,
            NodeConfig::Output(config) => control::execute_output(&ctx, config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_store::InMemoryDataStore;
    use async_trait::async_trait;
    use flowdeck_ai::ScriptedBackend;
    use flowdeck_core::{ConnectionId, WorkflowId};
    use flowdeck_oauth::{
        Connection, ConnectionStoreError, OAuthService, ProviderRegistry,
    };
    use flowdeck_workflow::node::{
        OutputConfig, TransformConfig, TriggerNodeConfig,
    };
    use std::collections::HashMap;

    struct NoConnections;

    #[async_trait]
    impl ConnectionStore for NoConnections {
        async fn get(&self, id: ConnectionId) -> Result<Connection, ConnectionStoreError> {
            Err(ConnectionStoreError::NotFound { id })
        }
    }

    fn dispatcher() -> Dispatcher {
        let vault = Arc::new(flowdeck_integration::InMemoryVault::new());
        let oauth = Arc::new(
            OAuthService::new(
                ProviderRegistry::builtin(),
                HashMap::new(),
                "https://flowdeck.example.com/oauth/callback",
            )
            .expect("oauth service"),
        );
        Dispatcher::new(
            Arc::new(ScriptedBackend::answering("ok")),
            Arc::new(NoConnections),
            Arc::new(TokenRefreshService::new(oauth, vault)),
            ConnectorRegistry::new(),
            Arc::new(InMemoryDataStore::new()),
        )
    }

    fn inputs(run_input: JsonValue) -> NodeInputs {
        NodeInputs {
            workflow_id: WorkflowId::new(),
            run_input: Some(run_input),
            variables: Default::default(),
            outputs: Default::default(),
        }
    }

    #[tokio::test]
    async fn dispatches_trigger() {
        let dispatcher = dispatcher();
        let node = Node::new("Start", NodeConfig::Trigger(TriggerNodeConfig::Manual));

        let output = dispatcher
            .execute(&node, inputs(serde_json::json!({"hello": "world"})))
            .await
            .expect("execute");
        assert_eq!(output["hello"], "world");
    }

    #[tokio::test]
    async fn dispatches_transform() {
        let dispatcher = dispatcher();
        let node = Node::new(
            "Shape",
            NodeConfig::Transform(TransformConfig {
                template: serde_json::json!({"upper": "{{trigger.word}}!"}),
            }),
        );

        let output = dispatcher
            .execute(&node, inputs(serde_json::json!({"word": "go"})))
            .await
            .expect("execute");
        assert_eq!(output, serde_json::json!({"upper": "go!"}));
    }

    #[tokio::test]
    async fn dispatches_output() {
        let dispatcher = dispatcher();
        let node = Node::new(
            "Done",
            NodeConfig::Output(OutputConfig {
                template: serde_json::json!({"result": "{{trigger.value}}"}),
            }),
        );

        let output = dispatcher
            .execute(&node, inputs(serde_json::json!({"value": 9})))
            .await
            .expect("execute");
        assert_eq!(output, serde_json::json!({"result": 9}));
    }

    #[tokio::test]
    async fn data_store_set_then_get_same_workflow() {
        let dispatcher = dispatcher();
        let workflow_id = WorkflowId::new();

        let set_node = Node::new(
            "Remember",
            NodeConfig::DataStore(DataStoreNodeConfig {
                operation: DataStoreOperation::Set,
                key: "last_seen".to_string(),
                value: Some(serde_json::json!("{{trigger.user}}")),
                scope: DataStoreScope::Workflow,
            }),
        );
        let get_node = Node::new(
            "Recall",
            NodeConfig::DataStore(DataStoreNodeConfig {
                operation: DataStoreOperation::Get,
                key: "last_seen".to_string(),
                value: None,
                scope: DataStoreScope::Workflow,
            }),
        );

        let mut set_inputs = inputs(serde_json::json!({"user": "ada"}));
        set_inputs.workflow_id = workflow_id;
        dispatcher
            .execute(&set_node, set_inputs)
            .await
            .expect("set");

        let mut get_inputs = inputs(JsonValue::Null);
        get_inputs.workflow_id = workflow_id;
        let output = dispatcher
            .execute(&get_node, get_inputs)
            .await
            .expect("get");
        assert_eq!(output["value"], "ada");
    }

    #[tokio::test]
    async fn data_store_set_without_value_fails() {
        let dispatcher = dispatcher();
        let node = Node::new(
            "Bad",
            NodeConfig::DataStore(DataStoreNodeConfig {
                operation: DataStoreOperation::Set,
                key: "k".to_string(),
                value: None,
                scope: DataStoreScope::Workflow,
            }),
        );

        let result = dispatcher.execute(&node, inputs(JsonValue::Null)).await;
        assert!(matches!(
            result,
            Err(NodeExecutionError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn http_node_with_unknown_connection_fails_credential_resolution() {
        let dispatcher = dispatcher();
        let node = Node::new(
            "Fetch",
            NodeConfig::HttpRequest(flowdeck_workflow::node::HttpRequestConfig {
                url: "https://api.example.com".to_string(),
                connection_id: Some(ConnectionId::new()),
                ..Default::default()
            }),
        );

        let result = dispatcher.execute(&node, inputs(JsonValue::Null)).await;
        assert!(matches!(
            result,
            Err(NodeExecutionError::CredentialError { .. })
        ));
    }
}
