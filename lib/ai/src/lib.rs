//! LLM backend abstraction for the flowdeck platform.
//!
//! Workflow LLM nodes speak to providers through the `LlmBackend` trait;
//! the invocation record captures what was asked and what it cost.

pub mod anthropic;
pub mod backend;
pub mod error;
pub mod invocation;

pub use anthropic::AnthropicBackend;
pub use backend::ScriptedBackend;
pub use backend::{LlmBackend, LlmMessage, LlmRequest, LlmResponse, MessageRole, TokenUsage};
pub use error::LlmError;
pub use invocation::{LlmInvocation, LlmInvocationId};
