//! LLM invocation records.
//!
//! Every LLM call made during workflow execution produces an invocation
//! record: what was generated, by which model, at what token cost.

use crate::backend::{LlmResponse, TokenUsage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use ulid::Ulid;

/// Unique identifier for an LLM invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LlmInvocationId(Ulid);

impl LlmInvocationId {
    /// Creates a new invocation ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for LlmInvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LlmInvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "llm_{}", self.0)
    }
}

/// A completed LLM invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmInvocation {
    /// Unique identifier for this invocation.
    pub id: LlmInvocationId,
    /// The raw text output.
    pub content: String,
    /// Structured output (if a schema was provided).
    pub structured_output: Option<JsonValue>,
    /// Token usage statistics.
    pub usage: TokenUsage,
    /// Model that generated the response.
    pub model: String,
    /// When the call was made.
    pub timestamp: DateTime<Utc>,
    /// Latency in milliseconds.
    pub latency_ms: u64,
}

impl LlmInvocation {
    /// Creates an invocation record from a backend response.
    #[must_use]
    pub fn from_response(response: LlmResponse, latency_ms: u64) -> Self {
        Self {
            id: LlmInvocationId::new(),
            content: response.content,
            structured_output: response.structured_output,
            usage: response.usage,
            model: response.model,
            timestamp: Utc::now(),
            latency_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_id_display() {
        let id = LlmInvocationId::new();
        assert!(id.to_string().starts_with("llm_"));
    }

    #[test]
    fn invocation_from_response() {
        let response = LlmResponse {
            content: "hello".to_string(),
            structured_output: None,
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
            model: "claude-sonnet-4-5".to_string(),
        };

        let invocation = LlmInvocation::from_response(response, 320);
        assert_eq!(invocation.content, "hello");
        assert_eq!(invocation.usage.total(), 15);
        assert_eq!(invocation.latency_ms, 320);
    }
}
