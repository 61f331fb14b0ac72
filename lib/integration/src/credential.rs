//! Credential model and vault trait.
//!
//! All connection credentials are encrypted at rest. No plaintext secrets
//! are stored in configuration or written to logs.

use crate::error::CredentialError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use flowdeck_core::{ConnectionId, CredentialId};
use serde::{Deserialize, Serialize};

/// How long before expiry an OAuth token counts as needing refresh.
pub const REFRESH_SKEW_MINUTES: i64 = 5;

/// The kind of credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// OAuth 2.0 tokens.
    Oauth2,
    /// API key.
    ApiKey,
    /// Username and password.
    BasicAuth,
    /// Bearer token.
    BearerToken,
}

impl CredentialKind {
    /// Returns the kind as a stable string (used in storage).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oauth2 => "oauth2",
            Self::ApiKey => "api_key",
            Self::BasicAuth => "basic_auth",
            Self::BearerToken => "bearer_token",
        }
    }
}

/// Credential secret material (encrypted at rest).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialData {
    /// OAuth 2.0 tokens.
    Oauth2 {
        access_token: String,
        refresh_token: Option<String>,
        token_type: String,
        expires_at: Option<DateTime<Utc>>,
        scope: Option<String>,
    },
    /// API key.
    ApiKey {
        key: String,
        /// Header the key is sent in; defaults to `Authorization` handling
        /// in the connector when absent.
        header_name: Option<String>,
    },
    /// Basic authentication.
    BasicAuth { username: String, password: String },
    /// Bearer token.
    BearerToken { token: String },
}

impl CredentialData {
    /// Creates OAuth2 credential data with just an access token.
    #[must_use]
    pub fn oauth2(access_token: impl Into<String>) -> Self {
        Self::Oauth2 {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expires_at: None,
            scope: None,
        }
    }

    /// Creates API key credential data.
    #[must_use]
    pub fn api_key(key: impl Into<String>) -> Self {
        Self::ApiKey {
            key: key.into(),
            header_name: None,
        }
    }

    /// Creates basic auth credential data.
    #[must_use]
    pub fn basic_auth(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::BasicAuth {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the credential kind.
    #[must_use]
    pub fn kind(&self) -> CredentialKind {
        match self {
            Self::Oauth2 { .. } => CredentialKind::Oauth2,
            Self::ApiKey { .. } => CredentialKind::ApiKey,
            Self::BasicAuth { .. } => CredentialKind::BasicAuth,
            Self::BearerToken { .. } => CredentialKind::BearerToken,
        }
    }

    /// Checks if OAuth2 credentials need refresh.
    ///
    /// True when the token expires within the skew window. Tokens without
    /// an expiry, and non-OAuth credentials, never need refresh.
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        if let Self::Oauth2 {
            expires_at: Some(expires),
            ..
        } = self
        {
            return *expires < Utc::now() + Duration::minutes(REFRESH_SKEW_MINUTES);
        }
        false
    }
}

/// A stored credential (metadata only; secret material lives separately).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Unique identifier.
    pub id: CredentialId,
    /// The connection this credential belongs to.
    pub connection_id: ConnectionId,
    /// Credential name/label.
    pub name: String,
    /// Credential kind.
    pub kind: CredentialKind,
    /// When the credential was created.
    pub created_at: DateTime<Utc>,
    /// When the credential was last updated.
    pub updated_at: DateTime<Utc>,
    /// When the credential was last used.
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Creates a new credential.
    #[must_use]
    pub fn new(
        connection_id: ConnectionId,
        name: impl Into<String>,
        kind: CredentialKind,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: CredentialId::new(),
            connection_id,
            name: name.into(),
            kind,
            created_at: now,
            updated_at: now,
            last_used_at: None,
        }
    }

    /// Marks the credential as used.
    pub fn mark_used(&mut self) {
        self.last_used_at = Some(Utc::now());
    }

    /// Marks the credential as updated.
    pub fn mark_updated(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Trait for credential storage.
///
/// Implementations must encrypt secret material at rest.
#[async_trait]
pub trait CredentialVault: Send + Sync {
    /// Stores a credential with its data.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    async fn store(
        &self,
        credential: Credential,
        data: CredentialData,
    ) -> Result<CredentialId, CredentialError>;

    /// Retrieves credential metadata (without secret material).
    async fn get_metadata(&self, id: CredentialId) -> Result<Credential, CredentialError>;

    /// Retrieves credential data (decrypted).
    async fn get_data(&self, id: CredentialId) -> Result<CredentialData, CredentialError>;

    /// Updates credential data.
    async fn update_data(
        &self,
        id: CredentialId,
        data: CredentialData,
    ) -> Result<(), CredentialError>;

    /// Records that the credential was used.
    async fn touch(&self, id: CredentialId) -> Result<(), CredentialError>;

    /// Deletes a credential.
    async fn delete(&self, id: CredentialId) -> Result<(), CredentialError>;

    /// Lists credentials for a connection.
    async fn list_for_connection(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Vec<Credential>, CredentialError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_data_kinds() {
        assert_eq!(
            CredentialData::oauth2("tok").kind(),
            CredentialKind::Oauth2
        );
        assert_eq!(CredentialData::api_key("k").kind(), CredentialKind::ApiKey);
        assert_eq!(
            CredentialData::basic_auth("u", "p").kind(),
            CredentialKind::BasicAuth
        );
    }

    #[test]
    fn oauth2_needs_refresh_within_skew() {
        let expiring = CredentialData::Oauth2 {
            access_token: "token".to_string(),
            refresh_token: Some("refresh".to_string()),
            token_type: "Bearer".to_string(),
            expires_at: Some(Utc::now() + Duration::minutes(2)),
            scope: None,
        };
        assert!(expiring.needs_refresh());

        let fresh = CredentialData::Oauth2 {
            access_token: "token".to_string(),
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            scope: None,
        };
        assert!(!fresh.needs_refresh());
    }

    #[test]
    fn oauth2_without_expiry_never_needs_refresh() {
        assert!(!CredentialData::oauth2("token").needs_refresh());
    }

    #[test]
    fn non_oauth_never_needs_refresh() {
        assert!(!CredentialData::api_key("key").needs_refresh());
    }

    #[test]
    fn credential_creation() {
        let cred = Credential::new(ConnectionId::new(), "Slack Token", CredentialKind::Oauth2);

        assert_eq!(cred.name, "Slack Token");
        assert_eq!(cred.kind, CredentialKind::Oauth2);
        assert!(cred.last_used_at.is_none());
    }

    #[test]
    fn credential_data_serde_roundtrip() {
        let data = CredentialData::Oauth2 {
            access_token: "token".to_string(),
            refresh_token: Some("refresh".to_string()),
            token_type: "Bearer".to_string(),
            expires_at: Some(Utc::now()),
            scope: Some("chat:write".to_string()),
        };

        let json = serde_json::to_string(&data).expect("serialize");
        let parsed: CredentialData = serde_json::from_str(&json).expect("deserialize");

        match parsed {
            CredentialData::Oauth2 { access_token, .. } => {
                assert_eq!(access_token, "token");
            }
            _ => panic!("wrong credential kind"),
        }
    }
}
