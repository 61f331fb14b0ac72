//! HTTP request node executor.
//!
//! Builds the request from interpolated configuration, applies optional
//! connection auth, and wraps the response as
//! `{ "status": u16, "headers": {..}, "body": <json-or-string> }`.
//! Non-2xx responses fail the node with the status and a body snippet.

use crate::context::ExecutionContext;
use crate::interpolate::{render_string, resolve_json};
use flowdeck_integration::ResolvedAuth;
use flowdeck_workflow::node::{HttpMethod, HttpRequestConfig};
use flowdeck_workflow::worker::NodeExecutionError;
use serde_json::Value as JsonValue;
use std::time::Duration;

/// Default timeout for HTTP request nodes.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Executes an HTTP request node.
pub async fn execute_http(
    client: &reqwest::Client,
    ctx: &ExecutionContext,
    config: &HttpRequestConfig,
    auth: Option<ResolvedAuth>,
) -> Result<JsonValue, NodeExecutionError> {
    let url = render_string(ctx, &config.url).map_err(unresolved)?;

    let method = match config.method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
    };

    let timeout = Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
    let mut builder = client.request(method, &url).timeout(timeout);

    for (name, value) in &config.headers {
        let value = render_string(ctx, value).map_err(unresolved)?;
        builder = builder.header(name.as_str(), value);
    }

    let mut query = Vec::with_capacity(config.query.len());
    for (name, value) in &config.query {
        query.push((name.clone(), render_string(ctx, value).map_err(unresolved)?));
    }
    if !query.is_empty() {
        builder = builder.query(&query);
    }

    if let Some(body) = &config.body {
        let body = resolve_json(ctx, body).map_err(unresolved)?;
        builder = builder.json(&body);
    }

    if let Some(auth) = auth {
        builder = match auth {
            ResolvedAuth::Bearer { token } => builder.bearer_auth(token),
            ResolvedAuth::ApiKey { key, header_name } => match header_name {
                Some(header) => builder.header(header.as_str(), key),
                None => builder.bearer_auth(key),
            },
            ResolvedAuth::Basic { username, password } => {
                builder.basic_auth(username, Some(password))
            }
        };
    }

    let response = builder.send().await.map_err(|e| {
        if e.is_timeout() {
            NodeExecutionError::Timeout
        } else {
            NodeExecutionError::ExecutionFailed {
                message: format!("request to {url} failed: {e}"),
            }
        }
    })?;

    let status = response.status();
    let headers: serde_json::Map<String, JsonValue> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.to_string(), JsonValue::String(v.to_string())))
        })
        .collect();

    let text = response
        .text()
        .await
        .map_err(|e| NodeExecutionError::ExecutionFailed {
            message: format!("failed to read response body: {e}"),
        })?;

    if !status.is_success() {
        let snippet: String = text.chars().take(256).collect();
        return Err(NodeExecutionError::ExecutionFailed {
            message: format!("request to {url} returned {}: {snippet}", status.as_u16()),
        });
    }

    let body = serde_json::from_str(&text).unwrap_or(JsonValue::String(text));

    Ok(serde_json::json!({
        "status": status.as_u16(),
        "headers": headers,
        "body": body,
    }))
}

fn unresolved(e: crate::interpolate::InterpolationError) -> NodeExecutionError {
    NodeExecutionError::UnresolvedReference {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowdeck_core::WorkflowId;
    use flowdeck_workflow::worker::NodeInputs;

    fn context() -> ExecutionContext {
        ExecutionContext::new(NodeInputs {
            workflow_id: WorkflowId::new(),
            run_input: Some(serde_json::json!({"id": 42})),
            variables: Default::default(),
            outputs: Default::default(),
        })
    }

    #[tokio::test]
    async fn missing_reference_in_url_fails_before_sending() {
        let client = reqwest::Client::new();
        let ctx = context();
        let config = HttpRequestConfig {
            url: "https://api.example.com/items/{{trigger.missing}}".to_string(),
            ..Default::default()
        };

        let result = execute_http(&client, &ctx, &config, None).await;
        assert!(matches!(
            result,
            Err(NodeExecutionError::UnresolvedReference { .. })
        ));
    }

    #[tokio::test]
    async fn missing_reference_in_header_fails_before_sending() {
        let client = reqwest::Client::new();
        let ctx = context();
        let mut config = HttpRequestConfig {
            url: "https://api.example.com/items".to_string(),
            ..Default::default()
        };
        config
            .headers
            .insert("X-Request-Id".to_string(), "{{vars.nope}}".to_string());

        let result = execute_http(&client, &ctx, &config, None).await;
        assert!(matches!(
            result,
            Err(NodeExecutionError::UnresolvedReference { .. })
        ));
    }
}
