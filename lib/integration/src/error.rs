//! Error types for the integration crate.
//!
//! - `ConnectorError`: Errors from connector operations
//! - `CredentialError`: Errors from credential storage/retrieval

use flowdeck_core::{ConnectionId, CredentialId};
use std::fmt;

/// Errors from connector operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    /// Connection to service failed.
    ConnectionFailed { reason: String },
    /// Authentication failed.
    AuthenticationFailed { reason: String },
    /// Rate limit exceeded.
    RateLimited { retry_after_secs: Option<u64> },
    /// Operation not supported.
    OperationNotSupported { operation: String },
    /// Invalid operation parameters.
    InvalidParameters { operation: String, reason: String },
    /// The service returned an error response.
    ServiceError { status: u16, body: String },
    /// Timeout waiting for response.
    Timeout,
}

impl fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { reason } => {
                write!(f, "connection failed: {reason}")
            }
            Self::AuthenticationFailed { reason } => {
                write!(f, "authentication failed: {reason}")
            }
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::OperationNotSupported { operation } => {
                write!(f, "operation not supported: {operation}")
            }
            Self::InvalidParameters { operation, reason } => {
                write!(f, "invalid parameters for '{operation}': {reason}")
            }
            Self::ServiceError { status, body } => {
                write!(f, "service returned {status}: {body}")
            }
            Self::Timeout => write!(f, "operation timed out"),
        }
    }
}

impl std::error::Error for ConnectorError {}

/// Errors from credential operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Credential not found.
    NotFound { id: CredentialId },
    /// No credential exists for the connection.
    NoneForConnection { connection_id: ConnectionId },
    /// Encryption failed.
    EncryptionFailed { reason: String },
    /// Decryption failed.
    DecryptionFailed { reason: String },
    /// Invalid credential format.
    InvalidFormat { reason: String },
    /// Storage operation failed.
    StorageFailed { reason: String },
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => {
                write!(f, "credential not found: {id}")
            }
            Self::NoneForConnection { connection_id } => {
                write!(f, "no credential stored for connection {connection_id}")
            }
            Self::EncryptionFailed { reason } => {
                write!(f, "encryption failed: {reason}")
            }
            Self::DecryptionFailed { reason } => {
                write!(f, "decryption failed: {reason}")
            }
            Self::InvalidFormat { reason } => {
                write!(f, "invalid credential format: {reason}")
            }
            Self::StorageFailed { reason } => {
                write!(f, "storage operation failed: {reason}")
            }
        }
    }
}

impl std::error::Error for CredentialError {}
