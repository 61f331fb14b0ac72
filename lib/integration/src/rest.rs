//! Generic JSON-over-HTTP connector.
//!
//! Most third-party integrations are REST APIs: an operation maps to a
//! method + path, parameters travel as query (GET) or JSON body
//! (everything else), and the resolved credential is applied to the
//! request headers. Service-specific connectors can be built by
//! configuring operations on this type instead of writing bespoke HTTP
//! plumbing per service.

use crate::connector::{
    Connector, ConnectorInfo, OperationInfo, OperationOutcome, OperationRequest, ResolvedAuth,
};
use crate::error::ConnectorError;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// An operation exposed by a REST connector.
#[derive(Debug, Clone)]
pub struct RestOperation {
    /// HTTP method.
    pub method: reqwest::Method,
    /// Path relative to the base URL (e.g., "/chat.postMessage").
    pub path: String,
    /// Description for the catalog.
    pub description: String,
}

impl RestOperation {
    /// Creates a new operation.
    #[must_use]
    pub fn new(
        method: reqwest::Method,
        path: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            description: description.into(),
        }
    }
}

/// Generic REST connector.
pub struct RestConnector {
    kind: String,
    name: String,
    description: String,
    base_url: String,
    operations: HashMap<String, RestOperation>,
    client: reqwest::Client,
    timeout: Duration,
}

impl RestConnector {
    /// Creates a new REST connector for the given integration kind.
    #[must_use]
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let kind = kind.into();
        Self {
            description: format!("REST connector for {kind}"),
            kind,
            name: name.into(),
            base_url: base_url.into(),
            operations: HashMap::new(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Registers an operation.
    #[must_use]
    pub fn with_operation(mut self, name: impl Into<String>, operation: RestOperation) -> Self {
        self.operations.insert(name.into(), operation);
        self
    }

    /// Overrides the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Applies resolved auth material to a request builder.
    fn apply_auth(
        builder: reqwest::RequestBuilder,
        auth: &ResolvedAuth,
    ) -> reqwest::RequestBuilder {
        match auth {
            ResolvedAuth::Bearer { token } => builder.bearer_auth(token),
            ResolvedAuth::ApiKey { key, header_name } => match header_name {
                Some(header) => builder.header(header.as_str(), key),
                None => builder.bearer_auth(key),
            },
            ResolvedAuth::Basic { username, password } => {
                builder.basic_auth(username, Some(password))
            }
        }
    }

    /// Flattens a JSON object into query pairs. Non-object parameters are
    /// rejected for query-style operations.
    fn query_pairs(parameters: &JsonValue) -> Result<Vec<(String, String)>, ConnectorError> {
        match parameters {
            JsonValue::Null => Ok(Vec::new()),
            JsonValue::Object(map) => Ok(map
                .iter()
                .map(|(k, v)| {
                    let value = match v {
                        JsonValue::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), value)
                })
                .collect()),
            _ => Err(ConnectorError::InvalidParameters {
                operation: String::new(),
                reason: "query parameters must be a JSON object".to_string(),
            }),
        }
    }
}

#[async_trait]
impl Connector for RestConnector {
    fn info(&self) -> ConnectorInfo {
        let mut operations: Vec<OperationInfo> = self
            .operations
            .iter()
            .map(|(name, op)| OperationInfo {
                name: name.clone(),
                description: op.description.clone(),
            })
            .collect();
        operations.sort_by(|a, b| a.name.cmp(&b.name));

        ConnectorInfo {
            kind: self.kind.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            operations,
        }
    }

    async fn execute(
        &self,
        request: OperationRequest,
    ) -> Result<OperationOutcome, ConnectorError> {
        let operation = self.operations.get(&request.operation).ok_or_else(|| {
            ConnectorError::OperationNotSupported {
                operation: request.operation.clone(),
            }
        })?;

        let url = format!("{}{}", self.base_url, operation.path);
        let mut builder = self
            .client
            .request(operation.method.clone(), &url)
            .timeout(self.timeout);

        if operation.method == reqwest::Method::GET {
            let pairs =
                Self::query_pairs(&request.parameters).map_err(|e| match e {
                    ConnectorError::InvalidParameters { reason, .. } => {
                        ConnectorError::InvalidParameters {
                            operation: request.operation.clone(),
                            reason,
                        }
                    }
                    other => other,
                })?;
            builder = builder.query(&pairs);
        } else if !request.parameters.is_null() {
            builder = builder.json(&request.parameters);
        }

        if let Some(auth) = &request.auth {
            builder = Self::apply_auth(builder, auth);
        }

        let started = Instant::now();
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ConnectorError::Timeout
            } else {
                ConnectorError::ConnectionFailed {
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let body = response.text().await.map_err(|e| {
            ConnectorError::ConnectionFailed {
                reason: e.to_string(),
            }
        })?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ConnectorError::AuthenticationFailed {
                reason: format!("service returned {}", status.as_u16()),
            });
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ConnectorError::RateLimited {
                retry_after_secs: None,
            });
        }
        if !status.is_success() {
            let snippet: String = body.chars().take(256).collect();
            return Err(ConnectorError::ServiceError {
                status: status.as_u16(),
                body: snippet,
            });
        }

        let data =
            serde_json::from_str(&body).unwrap_or_else(|_| JsonValue::String(body.clone()));

        Ok(OperationOutcome {
            data,
            latency_ms,
            status: Some(status.as_u16()),
        })
    }

    async fn health_check(&self) -> Result<bool, ConnectorError> {
        let response = self
            .client
            .get(&self.base_url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ConnectorError::ConnectionFailed {
                reason: e.to_string(),
            })?;
        Ok(!response.status().is_server_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slack_connector() -> RestConnector {
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
                    "Lists channels",
                ),
            )
    }

    #[test]
    fn info_lists_operations_sorted() {
        let info = slack_connector().info();
        assert_eq!(info.kind, "slack");
        let names: Vec<_> = info.operations.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["list_channels", "post_message"]);
    }

    #[tokio::test]
    async fn unknown_operation_is_rejected() {
        let connector = slack_connector();
        let result = connector
            .execute(OperationRequest::new("unknown", JsonValue::Null))
            .await;
        assert!(matches!(
            result,
            Err(ConnectorError::OperationNotSupported { .. })
        ));
    }

    #[test]
    fn query_pairs_from_object() {
        let pairs = RestConnector::query_pairs(&serde_json::json!({
            "limit": 10,
            "cursor": "abc",
        }))
        .expect("pairs");
        assert!(pairs.contains(&("limit".to_string(), "10".to_string())));
        assert!(pairs.contains(&("cursor".to_string(), "abc".to_string())));
    }

    #[test]
    fn query_pairs_reject_non_object() {
        let result = RestConnector::query_pairs(&serde_json::json!([1, 2, 3]));
        assert!(result.is_err());
    }
}
