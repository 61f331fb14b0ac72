//! Connection model.
//!
//! A connection is the user-visible link between workflows and a third
//! party provider. It tracks lifecycle status; the secret material lives
//! in the credential vault under the linked credential ID.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowdeck_core::{ConnectionId, CredentialId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Awaiting OAuth completion.
    Pending,
    /// Successfully connected and usable.
    Connected,
    /// Connection failed or credentials invalid; re-authorization needed.
    Error,
    /// Disconnected; tokens revoked (best-effort).
    Revoked,
}

impl ConnectionStatus {
    /// Returns the status as a stable string (used in storage).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Connected => "connected",
            Self::Error => "error",
            Self::Revoked => "revoked",
        }
    }

    /// Parses a stored status string; unknown values map to Pending.
    #[must_use]
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "connected" => Self::Connected,
            "error" => Self::Error,
            "revoked" => Self::Revoked,
            _ => Self::Pending,
        }
    }
}

/// A connection record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Connection ID.
    pub id: ConnectionId,
    /// User-provided name/label.
    pub name: String,
    /// The provider key (e.g., "google") or integration kind for
    /// API-key-based connections.
    pub provider: String,
    /// Current status.
    pub status: ConnectionStatus,
    /// Error message if status is Error.
    pub error_message: Option<String>,
    /// The credential holding this connection's secret material, once
    /// authorization completed.
    pub credential_id: Option<CredentialId>,
    /// When the connection was created.
    pub created_at: DateTime<Utc>,
    /// When the connection was last updated.
    pub updated_at: DateTime<Utc>,
    /// When the connection was last successfully used.
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Connection {
    /// Creates a new pending connection.
    #[must_use]
    pub fn new(name: impl Into<String>, provider: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ConnectionId::new(),
            name: name.into(),
            provider: provider.into(),
            status: ConnectionStatus::Pending,
            error_message: None,
            credential_id: None,
            created_at: now,
            updated_at: now,
            last_used_at: None,
        }
    }

    /// Marks the connection as connected with its credential.
    pub fn mark_connected(&mut self, credential_id: CredentialId) {
        self.status = ConnectionStatus::Connected;
        self.credential_id = Some(credential_id);
        self.error_message = None;
        self.updated_at = Utc::now();
    }

    /// Marks the connection as errored.
    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.status = ConnectionStatus::Error;
        self.error_message = Some(message.into());
        self.updated_at = Utc::now();
    }

    /// Marks the connection as revoked.
    pub fn mark_revoked(&mut self) {
        self.status = ConnectionStatus::Revoked;
        self.updated_at = Utc::now();
    }

    /// Updates the last used timestamp.
    pub fn mark_used(&mut self) {
        self.last_used_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Returns true if the connection can serve credential lookups.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.status == ConnectionStatus::Connected && self.credential_id.is_some()
    }
}

/// Errors from connection lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStoreError {
    /// Connection not found.
    NotFound { id: ConnectionId },
    /// Storage operation failed.
    StorageFailed { reason: String },
}

impl fmt::Display for ConnectionStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "connection not found: {id}"),
            Self::StorageFailed { reason } => write!(f, "connection storage failed: {reason}"),
        }
    }
}

impl std::error::Error for ConnectionStoreError {}

/// Read access to connections, for the execution layer.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Fetches a connection by ID.
    async fn get(&self, id: ConnectionId) -> Result<Connection, ConnectionStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_connection_is_pending() {
        let connection = Connection::new("My Slack", "slack");
        assert_eq!(connection.status, ConnectionStatus::Pending);
        assert!(!connection.is_usable());
    }

    #[test]
    fn connected_connection_is_usable() {
        let mut connection = Connection::new("My Slack", "slack");
        connection.mark_connected(CredentialId::new());
        assert!(connection.is_usable());
        assert!(connection.error_message.is_none());
    }

    #[test]
    fn error_clears_on_reconnect() {
        let mut connection = Connection::new("My Slack", "slack");
        connection.mark_error("token rejected");
        assert_eq!(connection.status, ConnectionStatus::Error);

        connection.mark_connected(CredentialId::new());
        assert_eq!(connection.status, ConnectionStatus::Connected);
        assert!(connection.error_message.is_none());
    }

    #[test]
    fn status_string_roundtrip() {
        for status in [
            ConnectionStatus::Pending,
            ConnectionStatus::Connected,
            ConnectionStatus::Error,
            ConnectionStatus::Revoked,
        ] {
            assert_eq!(ConnectionStatus::from_str_value(status.as_str()), status);
        }
        assert_eq!(
            ConnectionStatus::from_str_value("garbage"),
            ConnectionStatus::Pending
        );
    }
}
