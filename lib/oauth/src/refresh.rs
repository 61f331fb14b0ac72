//! Lazy token refresh over the credential vault.
//!
//! Callers never read OAuth credentials from the vault directly: they go
//! through `TokenRefreshService::resolve`, which refreshes tokens inside
//! the expiry skew window before handing them out and persists rotated
//! secrets back to the vault.

use crate::error::{OAuthError, TokenRefreshError};
use crate::service::OAuthService;
use flowdeck_core::CredentialId;
use flowdeck_integration::{CredentialData, CredentialVault};
use std::sync::Arc;

/// Refresh-on-read wrapper around the OAuth service and the vault.
pub struct TokenRefreshService {
    oauth: Arc<OAuthService>,
    vault: Arc<dyn CredentialVault>,
}

impl TokenRefreshService {
    /// Creates a new refresh service.
    #[must_use]
    pub fn new(oauth: Arc<OAuthService>, vault: Arc<dyn CredentialVault>) -> Self {
        Self { oauth, vault }
    }

    /// Resolves a credential into usable secret material.
    ///
    /// OAuth credentials inside the skew window are refreshed against the
    /// provider first; the rotated token set is written back before being
    /// returned. Non-OAuth credentials pass through untouched. Usage is
    /// recorded either way.
    ///
    /// # Errors
    ///
    /// Returns `NeedsReauthorization` when the token is expiring and no
    /// refresh token exists, or when the provider rejects the refresh with
    /// `invalid_grant`.
    pub async fn resolve(
        &self,
        credential_id: CredentialId,
        provider: &str,
    ) -> Result<CredentialData, TokenRefreshError> {
        let data = self.vault.get_data(credential_id).await?;

        if !data.needs_refresh() {
            self.vault.touch(credential_id).await?;
            return Ok(data);
        }

        let CredentialData::Oauth2 {
            refresh_token: Some(refresh_token),
            ..
        } = &data
        else {
            // Expiring with nothing to refresh with.
            return Err(TokenRefreshError::NeedsReauthorization { credential_id });
        };

        tracing::debug!(%credential_id, provider, "access token expiring, refreshing");

        let token_set = match self.oauth.refresh(provider, refresh_token).await {
            Ok(set) => set,
            Err(OAuthError::InvalidGrant { reason }) => {
                tracing::warn!(%credential_id, provider, reason, "refresh token rejected");
                return Err(TokenRefreshError::NeedsReauthorization { credential_id });
            }
            Err(e) => return Err(TokenRefreshError::OAuth(e)),
        };

        let rotated = token_set.into_credential_data(Some(refresh_token.clone()));
        self.vault.update_data(credential_id, rotated.clone()).await?;
        self.vault.touch(credential_id).await?;

        Ok(rotated)
    }

    /// Resolves a credential and returns a bare access token.
    ///
    /// Convenience for callers that only speak bearer auth.
    ///
    /// # Errors
    ///
    /// As [`resolve`](Self::resolve); additionally errors if the credential
    /// is not token-shaped.
    pub async fn access_token(
        &self,
        credential_id: CredentialId,
        provider: &str,
    ) -> Result<String, TokenRefreshError> {
        match self.resolve(credential_id, provider).await? {
            CredentialData::Oauth2 { access_token, .. } => Ok(access_token),
            CredentialData::BearerToken { token } => Ok(token),
            CredentialData::ApiKey { key, .. } => Ok(key),
            CredentialData::BasicAuth { .. } => Err(TokenRefreshError::Credential(
                flowdeck_integration::CredentialError::InvalidFormat {
                    reason: "basic auth credentials carry no token".to_string(),
                },
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderCredentials, ProviderRegistry};
    use chrono::{Duration, Utc};
    use flowdeck_core::ConnectionId;
    use flowdeck_integration::{Credential, CredentialKind, InMemoryVault};
    use std::collections::HashMap;

    fn refresh_service(vault: Arc<InMemoryVault>) -> TokenRefreshService {
        let mut credentials = HashMap::new();
        credentials.insert(
            "google".to_string(),
            ProviderCredentials {
                client_id: "client".to_string(),
                client_secret: Some("secret".to_string()),
            },
        );
        let oauth = OAuthService::new(
            ProviderRegistry::builtin(),
            credentials,
            "https://flowdeck.example.com/oauth/callback",
        )
        .expect("service");
        TokenRefreshService::new(Arc::new(oauth), vault)
    }

    async fn store(vault: &InMemoryVault, data: CredentialData) -> CredentialId {
        let credential = Credential::new(ConnectionId::new(), "Test", data.kind());
        vault.store(credential, data).await.expect("store")
    }

    #[tokio::test]
    async fn fresh_token_passes_through() {
        let vault = Arc::new(InMemoryVault::new());
        let id = store(
            &vault,
            CredentialData::Oauth2 {
                access_token: "fresh".to_string(),
                refresh_token: Some("refresh".to_string()),
                token_type: "Bearer".to_string(),
                expires_at: Some(Utc::now() + Duration::hours(1)),
                scope: None,
            },
        )
        .await;

        let service = refresh_service(vault.clone());
        let token = service.access_token(id, "google").await.expect("token");
        assert_eq!(token, "fresh");

        // Usage was recorded.
        let metadata = vault.get_metadata(id).await.expect("metadata");
        assert!(metadata.last_used_at.is_some());
    }

    #[tokio::test]
    async fn non_oauth_credentials_pass_through() {
        let vault = Arc::new(InMemoryVault::new());
        let id = store(&vault, CredentialData::api_key("key_abc")).await;

        let service = refresh_service(vault);
        let data = service.resolve(id, "google").await.expect("data");
        assert_eq!(data, CredentialData::api_key("key_abc"));
    }

    #[tokio::test]
    async fn expiring_token_without_refresh_token_needs_reauthorization() {
        let vault = Arc::new(InMemoryVault::new());
        let id = store(
            &vault,
            CredentialData::Oauth2 {
                access_token: "stale".to_string(),
                refresh_token: None,
                token_type: "Bearer".to_string(),
                expires_at: Some(Utc::now() - Duration::minutes(1)),
                scope: None,
            },
        )
        .await;

        let service = refresh_service(vault);
        let result = service.resolve(id, "google").await;
        assert!(matches!(
            result,
            Err(TokenRefreshError::NeedsReauthorization { credential_id }) if credential_id == id
        ));
    }

    #[tokio::test]
    async fn missing_credential_surfaces_vault_error() {
        let vault = Arc::new(InMemoryVault::new());
        let service = refresh_service(vault);
        let result = service.resolve(CredentialId::new(), "google").await;
        assert!(matches!(result, Err(TokenRefreshError::Credential(_))));
    }

    #[test]
    fn basic_auth_has_no_access_token() {
        let kind = CredentialKind::BasicAuth;
        assert_eq!(kind.as_str(), "basic_auth");
    }
}
