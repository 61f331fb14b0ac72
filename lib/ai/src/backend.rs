//! LLM backend abstraction.
//!
//! Provides a unified interface over LLM providers. The workflow executor
//! builds requests from node configuration; which provider answers them is
//! a deployment concern.

use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A request to an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// The prompt to send.
    pub prompt: String,
    /// System prompt, if any.
    pub system: Option<String>,
    /// Context from previous messages.
    pub context: Vec<LlmMessage>,
    /// Optional JSON schema for structured output.
    pub output_schema: Option<JsonValue>,
    /// Temperature for sampling (0.0 - 1.0).
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    /// Creates a new simple request with just a prompt.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            context: Vec::new(),
            output_schema: None,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Adds a system prompt.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Adds an output schema for structured output.
    #[must_use]
    pub fn with_output_schema(mut self, schema: JsonValue) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the max tokens.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmMessage {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The content of the message.
    pub content: String,
}

impl LlmMessage {
    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User/human message.
    User,
    /// Assistant/AI message.
    Assistant,
    /// System message.
    System,
}

/// A response from an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The generated content.
    pub content: String,
    /// Structured output (if output_schema was provided).
    pub structured_output: Option<JsonValue>,
    /// Token usage statistics.
    pub usage: TokenUsage,
    /// Model that generated the response.
    pub model: String,
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of input tokens.
    pub input_tokens: u32,
    /// Number of output tokens.
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Returns the total number of tokens.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Trait for LLM backends.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generates a response for the given request.
    ///
    /// # Errors
    ///
    /// Returns an error if the LLM call fails.
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Returns the default model name this backend serves.
    fn model(&self) -> &str;
}

/// A backend that replays scripted responses, for tests.
///
/// Responses are served in order; when the script runs out, the last
/// response repeats.
pub struct ScriptedBackend {
    model: String,
    responses: std::sync::Mutex<Vec<LlmResponse>>,
}

impl ScriptedBackend {
    /// Creates a backend that always answers with the given content.
    #[must_use]
    pub fn answering(content: impl Into<String>) -> Self {
        Self {
            model: "scripted".to_string(),
            responses: std::sync::Mutex::new(vec![LlmResponse {
                content: content.into(),
                structured_output: None,
                usage: TokenUsage::default(),
                model: "scripted".to_string(),
            }]),
        }
    }

    /// Creates a backend from a list of responses.
    #[must_use]
    pub fn with_responses(responses: Vec<LlmResponse>) -> Self {
        Self {
            model: "scripted".to_string(),
            responses: std::sync::Mutex::new(responses),
        }
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn generate(&self, _request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let mut responses = self.responses.lock().expect("scripted backend lock");
        if responses.len() > 1 {
            Ok(responses.remove(0))
        } else {
            responses
                .first()
                .cloned()
                .ok_or_else(|| LlmError::RequestFailed {
                    reason: "scripted backend has no responses".to_string(),
                })
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}
