//! API error type and HTTP mapping.
//!
//! Handlers return `ApiError`; the `IntoResponse` impl renders a JSON body
//! `{ "error": <kind>, "message": <detail> }` with the matching status
//! code. Internal details are logged, not leaked.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use flowdeck_integration::CredentialError;
use flowdeck_oauth::{ConnectionStoreError, OAuthError, TokenRefreshError};
use flowdeck_workflow::WorkflowError;
use flowdeck_workflow::orchestrator::OrchestratorError;
use serde_json::json;
use std::fmt;

/// Errors surfaced by API handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound { resource: String },
    /// The request payload or parameters are invalid.
    BadRequest { message: String },
    /// Workflow definition failed validation.
    Validation { message: String },
    /// OAuth flow error (safe to surface).
    OAuth(OAuthError),
    /// The connection's credential requires re-authorization.
    NeedsReauthorization,
    /// Anything else.
    Internal { message: String },
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } | Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::OAuth(OAuthError::StateMismatch) => StatusCode::FORBIDDEN,
            Self::OAuth(OAuthError::UnknownProvider { .. }) => StatusCode::NOT_FOUND,
            Self::OAuth(_) => StatusCode::BAD_GATEWAY,
            Self::NeedsReauthorization => StatusCode::CONFLICT,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::BadRequest { .. } => "bad_request",
            Self::Validation { .. } => "validation_failed",
            Self::OAuth(_) => "oauth_error",
            Self::NeedsReauthorization => "needs_reauthorization",
            Self::Internal { .. } => "internal_error",
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { resource } => write!(f, "{resource} not found"),
            Self::BadRequest { message } => write!(f, "{message}"),
            Self::Validation { message } => write!(f, "{message}"),
            Self::OAuth(e) => write!(f, "{e}"),
            Self::NeedsReauthorization => {
                write!(f, "connection credential requires re-authorization")
            }
            Self::Internal { message } => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // Internal details are logged server-side only.
            Self::Internal { message } => {
                tracing::error!(error = %message, "internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(json!({ "error": self.kind(), "message": message })),
        )
            .into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Self::NotFound {
                resource: "record".to_string(),
            },
            other => Self::Internal {
                message: format!("database error: {other}"),
            },
        }
    }
}

impl From<OAuthError> for ApiError {
    fn from(e: OAuthError) -> Self {
        Self::OAuth(e)
    }
}

impl From<CredentialError> for ApiError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::NotFound { .. } | CredentialError::NoneForConnection { .. } => {
                Self::NotFound {
                    resource: "credential".to_string(),
                }
            }
            other => Self::Internal {
                message: other.to_string(),
            },
        }
    }
}

impl From<TokenRefreshError> for ApiError {
    fn from(e: TokenRefreshError) -> Self {
        match e {
            TokenRefreshError::NeedsReauthorization { .. } => Self::NeedsReauthorization,
            TokenRefreshError::Credential(inner) => inner.into(),
            TokenRefreshError::OAuth(inner) => Self::OAuth(inner),
        }
    }
}

impl From<ConnectionStoreError> for ApiError {
    fn from(e: ConnectionStoreError) -> Self {
        match e {
            ConnectionStoreError::NotFound { .. } => Self::NotFound {
                resource: "connection".to_string(),
            },
            ConnectionStoreError::StorageFailed { reason } => Self::Internal { message: reason },
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(e: WorkflowError) -> Self {
        Self::Validation {
            message: e.to_string(),
        }
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(e: OrchestratorError) -> Self {
        Self::Internal {
            message: e.to_string(),
        }
    }
}

impl From<crate::crypto::CryptoError> for ApiError {
    fn from(e: crate::crypto::CryptoError) -> Self {
        Self::Internal {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = ApiError::NotFound {
            resource: "workflow".to_string(),
        };
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn state_mismatch_maps_to_403() {
        let err: ApiError = OAuthError::StateMismatch.into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn reauthorization_maps_to_409() {
        let err: ApiError = TokenRefreshError::NeedsReauthorization {
            credential_id: flowdeck_core::CredentialId::new(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn row_not_found_maps_to_404() {
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
