//! Anthropic Messages API backend.

use crate::backend::{LlmBackend, LlmRequest, LlmResponse, MessageRole, TokenUsage};
use crate::error::LlmError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// LLM backend speaking the Anthropic Messages API.
pub struct AnthropicBackend {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicBackend {
    /// Creates a backend with the default API endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Overrides the API base URL (proxies, compatible gateways).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_body(&self, request: &LlmRequest) -> JsonValue {
        let mut messages: Vec<JsonValue> = request
            .context
            .iter()
            .map(|message| {
                json!({
                    "role": match message.role {
                        MessageRole::Assistant => "assistant",
                        MessageRole::User | MessageRole::System => "user",
                    },
                    "content": message.content,
                })
            })
            .collect();
        messages.push(json!({"role": "user", "content": request.prompt}));

        let mut body = json!({
            "model": self.model,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": messages,
        });
        if let Some(system) = &request.system {
            body["system"] = json!(system);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: String,
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/v1/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.build_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::ProviderUnavailable {
                        provider: "anthropic".to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited {
                retry_after_secs: response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok()),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed {
                reason: format!("{} returned {}: {body}", url, status.as_u16()),
            });
        }

        let parsed: MessagesResponse =
            response
                .json()
                .await
                .map_err(|e| LlmError::ResponseParseFailed {
                    reason: e.to_string(),
                })?;

        let content: String = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect();

        // When a schema was requested, surface parseable JSON output too.
        let structured_output = request
            .output_schema
            .as_ref()
            .and_then(|_| serde_json::from_str(&content).ok());

        Ok(LlmResponse {
            content,
            structured_output,
            usage: TokenUsage {
                input_tokens: parsed.usage.input_tokens,
                output_tokens: parsed.usage.output_tokens,
            },
            model: parsed.model,
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_includes_system_and_temperature() {
        let backend = AnthropicBackend::new("key", "claude-sonnet-4-5");
        let request = LlmRequest::new("Summarize this")
            .with_system("Be terse.")
            .with_temperature(0.2)
            .with_max_tokens(256);

        let body = backend.build_body(&request);
        assert_eq!(body["model"], "claude-sonnet-4-5");
        assert_eq!(body["system"], "Be terse.");
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Summarize this");
    }

    #[test]
    fn body_defaults_max_tokens() {
        let backend = AnthropicBackend::new("key", "claude-sonnet-4-5");
        let body = backend.build_body(&LlmRequest::new("hi"));
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert!(body.get("system").is_none());
    }
}
