//! Error types for the OAuth crate.

use flowdeck_core::CredentialId;
use flowdeck_integration::CredentialError;
use std::fmt;

/// Errors from the OAuth service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthError {
    /// The provider key is not in the registry.
    UnknownProvider { provider: String },
    /// The provider is registered but has no client credentials configured.
    NotConfigured { provider: String },
    /// A provider endpoint URL is invalid.
    Configuration { reason: String },
    /// The callback state did not match any pending authorization.
    ///
    /// Covers forged, replayed, and expired states alike; callers must not
    /// distinguish them to the outside.
    StateMismatch,
    /// Token endpoint call failed.
    TokenExchange { reason: String },
    /// The provider rejected the grant (expired/revoked refresh token or
    /// authorization code).
    InvalidGrant { reason: String },
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownProvider { provider } => {
                write!(f, "unknown provider: {provider}")
            }
            Self::NotConfigured { provider } => {
                write!(f, "provider '{provider}' has no client credentials configured")
            }
            Self::Configuration { reason } => {
                write!(f, "provider configuration error: {reason}")
            }
            Self::StateMismatch => write!(f, "authorization state mismatch"),
            Self::TokenExchange { reason } => {
                write!(f, "token exchange failed: {reason}")
            }
            Self::InvalidGrant { reason } => {
                write!(f, "invalid grant: {reason}")
            }
        }
    }
}

impl std::error::Error for OAuthError {}

/// Errors from the token refresh service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRefreshError {
    /// Vault access failed.
    Credential(CredentialError),
    /// The refresh call failed.
    OAuth(OAuthError),
    /// The credential expired and cannot be refreshed; the user must go
    /// through authorization again.
    NeedsReauthorization { credential_id: CredentialId },
}

impl fmt::Display for TokenRefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credential(e) => write!(f, "credential error: {e}"),
            Self::OAuth(e) => write!(f, "refresh failed: {e}"),
            Self::NeedsReauthorization { credential_id } => {
                write!(f, "credential {credential_id} requires re-authorization")
            }
        }
    }
}

impl std::error::Error for TokenRefreshError {}

impl From<CredentialError> for TokenRefreshError {
    fn from(e: CredentialError) -> Self {
        Self::Credential(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oauth_error_display() {
        let err = OAuthError::UnknownProvider {
            provider: "hubspot".to_string(),
        };
        assert!(err.to_string().contains("hubspot"));
    }

    #[test]
    fn state_mismatch_reveals_nothing() {
        assert_eq!(
            OAuthError::StateMismatch.to_string(),
            "authorization state mismatch"
        );
    }

    #[test]
    fn refresh_error_wraps_credential_error() {
        let id = CredentialId::new();
        let err: TokenRefreshError = CredentialError::NotFound { id }.into();
        assert!(err.to_string().contains("credential error"));
    }
}
