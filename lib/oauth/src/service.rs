//! Generic OAuth 2.0 service: authorize, exchange, refresh, revoke.
//!
//! All flows are driven by the provider registry; nothing in this module is
//! provider-specific. The service holds the in-memory CSRF state store, so
//! one instance must serve both the authorize and callback endpoints.

use crate::error::OAuthError;
use crate::provider::{ProviderConfig, ProviderCredentials, ProviderRegistry};
use crate::state::{AuthStateStore, PendingAuthorization};
use chrono::{DateTime, Utc};
use flowdeck_core::ConnectionId;
use flowdeck_integration::CredentialData;
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicErrorResponseType, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, RefreshToken, RequestTokenError, Scope, TokenResponse,
    TokenUrl,
};
use std::collections::HashMap;

/// The start of an authorization flow.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// URL to redirect the end user to.
    pub authorize_url: String,
    /// The CSRF state recorded for this flow.
    pub state: String,
}

/// Tokens obtained from a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    /// The access token.
    pub access_token: String,
    /// The refresh token, when the provider issued one.
    pub refresh_token: Option<String>,
    /// Token type (practically always "Bearer").
    pub token_type: String,
    /// Absolute expiry, derived from the provider's `expires_in`.
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted scope, when reported.
    pub scope: Option<String>,
}

impl TokenSet {
    /// Builds a token set from a token endpoint response.
    fn from_response(response: &BasicTokenResponse) -> Self {
        Self {
            access_token: response.access_token().secret().clone(),
            refresh_token: response.refresh_token().map(|t| t.secret().clone()),
            token_type: "Bearer".to_string(),
            expires_at: response
                .expires_in()
                .and_then(|d| chrono::Duration::from_std(d).ok())
                .map(|d| Utc::now() + d),
            scope: response.scopes().map(|scopes| {
                scopes
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            }),
        }
    }

    /// Converts the token set into vault credential data.
    ///
    /// Providers frequently omit the refresh token on refresh responses;
    /// the previous refresh token is carried forward in that case.
    #[must_use]
    pub fn into_credential_data(self, previous_refresh_token: Option<String>) -> CredentialData {
        CredentialData::Oauth2 {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh_token),
            token_type: self.token_type,
            expires_at: self.expires_at,
            scope: self.scope,
        }
    }
}

/// Generic OAuth 2.0 service over the provider registry.
pub struct OAuthService {
    registry: ProviderRegistry,
    credentials: HashMap<String, ProviderCredentials>,
    redirect_url: String,
    states: AuthStateStore,
    http: reqwest::Client,
}

impl OAuthService {
    /// Creates a new OAuth service.
    ///
    /// `redirect_url` is the single callback endpoint registered with every
    /// provider; the state value routes callbacks to their pending flows.
    ///
    /// # Errors
    ///
    /// Returns an error if the redirect URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(
        registry: ProviderRegistry,
        credentials: HashMap<String, ProviderCredentials>,
        redirect_url: impl Into<String>,
    ) -> Result<Self, OAuthError> {
        let redirect_url = redirect_url.into();
        RedirectUrl::new(redirect_url.clone()).map_err(|e| OAuthError::Configuration {
            reason: format!("invalid redirect URL: {e}"),
        })?;

        // Redirects disabled: token endpoints must answer directly.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| OAuthError::Configuration {
                reason: format!("HTTP client error: {e}"),
            })?;

        Ok(Self {
            registry,
            credentials,
            redirect_url,
            states: AuthStateStore::new(),
            http,
        })
    }

    /// Returns the provider registry.
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Returns the pending-state store (exposed for observability).
    #[must_use]
    pub fn states(&self) -> &AuthStateStore {
        &self.states
    }

    /// Looks up a provider and its configured client credentials.
    fn provider(
        &self,
        key: &str,
    ) -> Result<(&ProviderConfig, &ProviderCredentials), OAuthError> {
        let config = self
            .registry
            .get(key)
            .ok_or_else(|| OAuthError::UnknownProvider {
                provider: key.to_string(),
            })?;
        let credentials = self
            .credentials
            .get(key)
            .ok_or_else(|| OAuthError::NotConfigured {
                provider: key.to_string(),
            })?;
        Ok((config, credentials))
    }

    /// Starts an authorization-code flow for a connection.
    ///
    /// Returns the authorize URL to redirect the user to. The CSRF state
    /// and PKCE verifier are recorded in the state store until the callback
    /// arrives or the TTL expires.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is unknown, unconfigured, or has
    /// invalid endpoint URLs.
    pub fn start_authorization(
        &self,
        provider: &str,
        connection_id: ConnectionId,
        scopes: Option<Vec<String>>,
    ) -> Result<AuthorizationRequest, OAuthError> {
        let (config, credentials) = self.provider(provider)?;

        let auth_url =
            AuthUrl::new(config.auth_url.clone()).map_err(|e| OAuthError::Configuration {
                reason: format!("invalid auth URL for '{provider}': {e}"),
            })?;
        let redirect =
            RedirectUrl::new(self.redirect_url.clone()).map_err(|e| OAuthError::Configuration {
                reason: format!("invalid redirect URL: {e}"),
            })?;

        let client = BasicClient::new(ClientId::new(credentials.client_id.clone()))
            .set_auth_uri(auth_url)
            .set_redirect_uri(redirect);
        let client = match &credentials.client_secret {
            Some(secret) => client.set_client_secret(ClientSecret::new(secret.clone())),
            None => client,
        };

        let mut auth_request = client.authorize_url(CsrfToken::new_random);

        let pkce_verifier = if config.use_pkce {
            let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
            auth_request = auth_request.set_pkce_challenge(challenge);
            Some(verifier.secret().clone())
        } else {
            None
        };

        for scope in scopes.unwrap_or_else(|| config.default_scopes.clone()) {
            auth_request = auth_request.add_scope(Scope::new(scope));
        }

        for (name, value) in &config.extra_authorize_params {
            auth_request = auth_request.add_extra_param(name, value);
        }

        let (authorize_url, csrf_token) = auth_request.url();
        let state = csrf_token.secret().clone();

        self.states.insert(
            state.clone(),
            PendingAuthorization::new(connection_id, provider, pkce_verifier),
        );

        Ok(AuthorizationRequest {
            authorize_url: authorize_url.to_string(),
            state,
        })
    }

    /// Completes an authorization-code flow from the provider callback.
    ///
    /// Validates and consumes the CSRF state, then exchanges the code at
    /// the provider's token endpoint.
    ///
    /// # Errors
    ///
    /// Returns `StateMismatch` for unknown, replayed, or expired states,
    /// and a token exchange error if the provider rejects the code.
    pub async fn complete_authorization(
        &self,
        state: &str,
        code: &str,
    ) -> Result<(PendingAuthorization, TokenSet), OAuthError> {
        let pending = self.states.take(state).ok_or(OAuthError::StateMismatch)?;

        let (config, credentials) = self.provider(&pending.provider)?;
        let client = self.token_client(config, credentials)?;

        let mut request = client.exchange_code(AuthorizationCode::new(code.to_string()));
        if let Some(verifier) = &pending.pkce_verifier {
            request = request.set_pkce_verifier(PkceCodeVerifier::new(verifier.clone()));
        }

        let response = request
            .request_async(&self.http)
            .await
            .map_err(map_token_error)?;

        Ok((pending, TokenSet::from_response(&response)))
    }

    /// Refreshes an access token.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGrant` when the provider rejects the refresh token
    /// (revoked or expired), so callers can mark the connection as needing
    /// re-authorization.
    pub async fn refresh(
        &self,
        provider: &str,
        refresh_token: &str,
    ) -> Result<TokenSet, OAuthError> {
        let (config, credentials) = self.provider(provider)?;
        let client = self.token_client(config, credentials)?;

        let response = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
            .map_err(map_token_error)?;

        Ok(TokenSet::from_response(&response))
    }

    /// Revokes a token, best-effort.
    ///
    /// Providers without a revocation endpoint are a no-op. Failures are
    /// logged and swallowed: revocation must never block disconnecting a
    /// connection.
    pub async fn revoke(&self, provider: &str, token: &str) {
        let Some(config) = self.registry.get(provider) else {
            tracing::warn!(provider, "revoke requested for unknown provider");
            return;
        };
        let Some(revoke_url) = &config.revoke_url else {
            tracing::debug!(provider, "provider has no revocation endpoint");
            return;
        };

        let result = self
            .http
            .post(revoke_url)
            .form(&[("token", token)])
            .bearer_auth(token)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(provider, "token revoked");
            }
            Ok(response) => {
                tracing::warn!(
                    provider,
                    status = response.status().as_u16(),
                    "token revocation rejected"
                );
            }
            Err(e) => {
                tracing::warn!(provider, error = %e, "token revocation failed");
            }
        }
    }

    /// Builds a client configured for token endpoint calls.
    fn token_client(
        &self,
        config: &ProviderConfig,
        credentials: &ProviderCredentials,
    ) -> Result<TokenEndpointClient, OAuthError> {
        let token_url =
            TokenUrl::new(config.token_url.clone()).map_err(|e| OAuthError::Configuration {
                reason: format!("invalid token URL for '{}': {e}", config.key),
            })?;
        let redirect =
            RedirectUrl::new(self.redirect_url.clone()).map_err(|e| OAuthError::Configuration {
                reason: format!("invalid redirect URL: {e}"),
            })?;

        let client = BasicClient::new(ClientId::new(credentials.client_id.clone()))
            .set_token_uri(token_url)
            .set_redirect_uri(redirect);
        Ok(match &credentials.client_secret {
            Some(secret) => client.set_client_secret(ClientSecret::new(secret.clone())),
            None => client,
        })
    }
}

type TokenEndpointClient = BasicClient<
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointSet,
>;

/// Maps token endpoint errors, surfacing `invalid_grant` distinctly.
fn map_token_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> OAuthError
where
    RE: std::error::Error,
{
    match &err {
        RequestTokenError::ServerResponse(response)
            if matches!(response.error(), BasicErrorResponseType::InvalidGrant) =>
        {
            OAuthError::InvalidGrant {
                reason: response
                    .error_description()
                    .cloned()
                    .unwrap_or_else(|| "provider rejected the grant".to_string()),
            }
        }
        _ => OAuthError::TokenExchange {
            reason: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> OAuthService {
        let mut credentials = HashMap::new();
        credentials.insert(
            "google".to_string(),
            ProviderCredentials {
                client_id: "client_123".to_string(),
                client_secret: Some("secret_456".to_string()),
            },
        );
        credentials.insert(
            "notion".to_string(),
            ProviderCredentials {
                client_id: "notion_client".to_string(),
                client_secret: Some("notion_secret".to_string()),
            },
        );
        OAuthService::new(
            ProviderRegistry::builtin(),
            credentials,
            "https://flowdeck.example.com/oauth/callback",
        )
        .expect("service")
    }

    #[test]
    fn start_authorization_builds_url_with_pkce() {
        let service = service();
        let request = service
            .start_authorization("google", ConnectionId::new(), None)
            .expect("authorization request");

        assert!(request.authorize_url.starts_with("https://accounts.google.com/"));
        assert!(request.authorize_url.contains("client_id=client_123"));
        assert!(request.authorize_url.contains("code_challenge="));
        assert!(request.authorize_url.contains("code_challenge_method=S256"));
        assert!(request.authorize_url.contains("access_type=offline"));
        assert!(request.authorize_url.contains(&format!("state={}", request.state)));

        // The state is now pending.
        assert_eq!(service.states().len(), 1);
    }

    #[test]
    fn start_authorization_without_pkce() {
        let service = service();
        let request = service
            .start_authorization("notion", ConnectionId::new(), None)
            .expect("authorization request");

        assert!(!request.authorize_url.contains("code_challenge"));
        assert!(request.authorize_url.contains("owner=user"));
    }

    #[test]
    fn custom_scopes_override_defaults() {
        let service = service();
        let request = service
            .start_authorization(
                "google",
                ConnectionId::new(),
                Some(vec!["https://www.googleapis.com/auth/gmail.readonly".to_string()]),
            )
            .expect("authorization request");

        assert!(request.authorize_url.contains("gmail.readonly"));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let service = service();
        let result = service.start_authorization("hubspot", ConnectionId::new(), None);
        assert!(matches!(
            result,
            Err(OAuthError::UnknownProvider { .. })
        ));
    }

    #[test]
    fn unconfigured_provider_is_rejected() {
        let service = service();
        // slack is in the registry but has no client credentials configured
        let result = service.start_authorization("slack", ConnectionId::new(), None);
        assert!(matches!(result, Err(OAuthError::NotConfigured { .. })));
    }

    #[tokio::test]
    async fn callback_with_unknown_state_is_rejected() {
        let service = service();
        let result = service
            .complete_authorization("forged_state", "code_abc")
            .await;
        assert!(matches!(result, Err(OAuthError::StateMismatch)));
    }

    #[test]
    fn token_set_keeps_previous_refresh_token() {
        let set = TokenSet {
            access_token: "new_access".to_string(),
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expires_at: None,
            scope: None,
        };
        let data = set.into_credential_data(Some("old_refresh".to_string()));
        match data {
            CredentialData::Oauth2 {
                access_token,
                refresh_token,
                ..
            } => {
                assert_eq!(access_token, "new_access");
                assert_eq!(refresh_token.as_deref(), Some("old_refresh"));
            }
            other => panic!("unexpected data: {other:?}"),
        }
    }

    #[test]
    fn token_set_prefers_rotated_refresh_token() {
        let set = TokenSet {
            access_token: "new_access".to_string(),
            refresh_token: Some("rotated".to_string()),
            token_type: "Bearer".to_string(),
            expires_at: None,
            scope: None,
        };
        let data = set.into_credential_data(Some("old_refresh".to_string()));
        match data {
            CredentialData::Oauth2 { refresh_token, .. } => {
                assert_eq!(refresh_token.as_deref(), Some("rotated"));
            }
            other => panic!("unexpected data: {other:?}"),
        }
    }
}
