//! OAuth provider registry.
//!
//! Providers are plain configuration: endpoint URLs, default scopes, and
//! the extra authorize parameters each provider wants. The registry ships
//! built-in entries for common providers; operators can add or override
//! entries from configuration.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Static configuration for a single OAuth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Registry key (e.g., "google").
    pub key: String,
    /// Human-readable name.
    pub display_name: String,
    /// Authorization endpoint.
    pub auth_url: String,
    /// Token endpoint.
    pub token_url: String,
    /// Revocation endpoint, when the provider has one.
    pub revoke_url: Option<String>,
    /// Scopes requested when the caller specifies none.
    #[serde(default)]
    pub default_scopes: Vec<String>,
    /// Whether to use PKCE (RFC 7636 S256).
    #[serde(default = "default_use_pkce")]
    pub use_pkce: bool,
    /// Extra query parameters appended to the authorize URL.
    #[serde(default)]
    pub extra_authorize_params: BTreeMap<String, String>,
}

fn default_use_pkce() -> bool {
    true
}

impl ProviderConfig {
    /// Creates a minimal provider configuration.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        display_name: impl Into<String>,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            revoke_url: None,
            default_scopes: Vec::new(),
            use_pkce: true,
            extra_authorize_params: BTreeMap::new(),
        }
    }

    /// Sets the revocation endpoint.
    #[must_use]
    pub fn with_revoke_url(mut self, url: impl Into<String>) -> Self {
        self.revoke_url = Some(url.into());
        self
    }

    /// Sets the default scopes.
    #[must_use]
    pub fn with_scopes<S: Into<String>>(mut self, scopes: impl IntoIterator<Item = S>) -> Self {
        self.default_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an extra authorize parameter.
    #[must_use]
    pub fn with_authorize_param(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.extra_authorize_params
            .insert(name.into(), value.into());
        self
    }

    /// Disables PKCE for providers that do not support it.
    #[must_use]
    pub fn without_pkce(mut self) -> Self {
        self.use_pkce = false;
        self
    }
}

/// Per-provider client credentials, supplied by operator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderCredentials {
    /// OAuth client ID.
    pub client_id: String,
    /// OAuth client secret. Absent for public PKCE-only clients.
    pub client_secret: Option<String>,
}

/// Registry of OAuth providers, keyed by provider key.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderConfig>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry populated with built-in providers.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        registry.insert(
            ProviderConfig::new(
                "google",
                "Google",
                "https://accounts.google.com/o/oauth2/v2/auth",
                "https://oauth2.googleapis.com/token",
            )
            .with_revoke_url("https://oauth2.googleapis.com/revoke")
            .with_scopes(["openid", "email"])
            // Offline access + forced consent so Google returns a refresh token
            .with_authorize_param("access_type", "offline")
            .with_authorize_param("prompt", "consent"),
        );

        registry.insert(
            ProviderConfig::new(
                "github",
                "GitHub",
                "https://github.com/login/oauth/authorize",
                "https://github.com/login/oauth/access_token",
            )
            .with_scopes(["repo", "read:user"]),
        );

        registry.insert(
            ProviderConfig::new(
                "slack",
                "Slack",
                "https://slack.com/oauth/v2/authorize",
                "https://slack.com/api/oauth.v2.access",
            )
            .with_revoke_url("https://slack.com/api/auth.revoke")
            .with_scopes(["chat:write", "channels:read"])
            .without_pkce(),
        );

        registry.insert(
            ProviderConfig::new(
                "notion",
                "Notion",
                "https://api.notion.com/v1/oauth/authorize",
                "https://api.notion.com/v1/oauth/token",
            )
            .with_authorize_param("owner", "user")
            .without_pkce(),
        );

        registry
    }

    /// Inserts (or overrides) a provider.
    pub fn insert(&mut self, config: ProviderConfig) {
        self.providers.insert(config.key.clone(), config);
    }

    /// Merges operator-supplied providers over the current entries.
    pub fn merge(&mut self, configs: impl IntoIterator<Item = ProviderConfig>) {
        for config in configs {
            self.insert(config);
        }
    }

    /// Returns the provider for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ProviderConfig> {
        self.providers.get(key)
    }

    /// Returns the registered provider keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.providers.keys().cloned().collect();
        keys.sort();
        keys
    }
}
