//! Error types for the AI crate.

use std::fmt;

/// Errors from LLM calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Provider is unavailable.
    ProviderUnavailable { provider: String, reason: String },
    /// Request failed.
    RequestFailed { reason: String },
    /// Response parsing failed.
    ResponseParseFailed { reason: String },
    /// Timeout waiting for response.
    Timeout,
    /// Rate limit exceeded.
    RateLimited { retry_after_secs: Option<u64> },
    /// Invalid configuration.
    InvalidConfig { reason: String },
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderUnavailable { provider, reason } => {
                write!(f, "LLM provider '{provider}' unavailable: {reason}")
            }
            Self::RequestFailed { reason } => {
                write!(f, "LLM request failed: {reason}")
            }
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse LLM response: {reason}")
            }
            Self::Timeout => write!(f, "LLM request timed out"),
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid LLM configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for LlmError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = LlmError::ProviderUnavailable {
            provider: "anthropic".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("anthropic"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn rate_limited_display() {
        let err = LlmError::RateLimited {
            retry_after_secs: Some(30),
        };
        assert!(err.to_string().contains("30s"));
    }
}
