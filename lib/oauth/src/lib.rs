//! OAuth 2.0 connection lifecycle for the flowdeck platform.
//!
//! This crate implements the generic authorization-code flow against a
//! config-driven provider registry:
//!
//! - **Provider registry**: auth/token/revoke endpoints, scopes, and
//!   authorize parameters per provider, with built-in entries
//! - **Auth state store**: in-memory, single-use CSRF state with TTL and
//!   linear expiry sweep
//! - **OAuthService**: authorize / exchange / refresh / revoke
//! - **TokenRefreshService**: lazy refresh-on-read over the credential vault
//! - **Connection**: the user-visible link between a workflow and a provider

pub mod connection;
pub mod error;
pub mod provider;
pub mod refresh;
pub mod service;
pub mod state;

pub use connection::{Connection, ConnectionStatus, ConnectionStore, ConnectionStoreError};
pub use error::{OAuthError, TokenRefreshError};
pub use provider::{ProviderConfig, ProviderCredentials, ProviderRegistry};
pub use refresh::TokenRefreshService;
pub use service::{AuthorizationRequest, OAuthService, TokenSet};
pub use state::{AuthStateStore, PendingAuthorization};
