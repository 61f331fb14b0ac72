//! Centralized server configuration.
//!
//! Strongly-typed configuration loaded via the `config` crate from
//! environment variables with `__` as the nesting separator, e.g.
//! `OAUTH__PROVIDERS__GOOGLE__CLIENT_ID`.

use flowdeck_oauth::{ProviderConfig, ProviderCredentials};
use serde::Deserialize;
use std::collections::HashMap;

/// Top-level server configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address to bind the HTTP listener to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// NATS URL for the execution substrate. When absent, the server runs
    /// with in-memory event and object stores (single-process mode).
    pub nats_url: Option<String>,

    /// Credential vault configuration.
    pub vault: VaultConfig,

    /// OAuth configuration.
    pub oauth: OAuthSettings,

    /// LLM backend configuration.
    pub llm: Option<LlmSettings>,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

/// Credential vault configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct VaultConfig {
    /// Base64-encoded 32-byte AES-256-GCM master key.
    pub master_key: String,
}

/// OAuth configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthSettings {
    /// The callback URL registered with every provider
    /// (e.g., "https://flowdeck.example.com/oauth/callback").
    pub redirect_url: String,

    /// Where to send the browser after a completed callback. When absent,
    /// the callback answers with JSON.
    pub ui_redirect_url: Option<String>,

    /// Client credentials per provider key.
    #[serde(default)]
    pub providers: HashMap<String, ProviderCredentials>,

    /// Additional provider definitions merged over the built-in registry.
    #[serde(default)]
    pub extra_providers: Vec<ProviderConfig>,
}

/// LLM backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    /// Anthropic API key.
    pub api_key: String,
    /// Default model for LLM nodes.
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Override for the API base URL.
    pub base_url: Option<String>,
}

fn default_llm_model() -> String {
    "claude-sonnet-4-5".to_string()
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
