use crate::{
    secrets::CredentialError,
    session::{SessionError, StateError},
    upstream::UpstreamError,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Every failure a handler or the auth gate can answer with.
///
/// Each variant maps to one status; the body is always `{"error": ...}`,
/// with extra fields only for downstream failures.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("Invalid state token (CSRF)")]
    InvalidState,
    #[error("{0}")]
    Input(&'static str),
    #[error("{message}")]
    Upstream {
        message: &'static str,
        #[source]
        source: UpstreamError,
    },
    #[error("Failed to fetch from Brush API")]
    Downstream { status: StatusCode, details: String },
    #[error("Not authenticated or invalid token")]
    Authentication,
    #[error("Invalid token audience")]
    AudienceMismatch,
    #[error("No access token found in session")]
    MissingAccessToken,
    #[error("An internal error occurred")]
    Internal(String),
}

impl ApiError {
    /// Wrap a provider failure with the message the client sees.
    #[must_use]
    pub fn upstream(message: &'static str, source: UpstreamError) -> Self {
        match source {
            UpstreamError::Credential(err) => Self::Credential(err),
            source => Self::Upstream { message, source },
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Credential(_) | Self::Upstream { .. } | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::InvalidState => StatusCode::FORBIDDEN,
            Self::Input(_) => StatusCode::BAD_REQUEST,
            Self::Downstream { status, .. } => *status,
            Self::Authentication | Self::AudienceMismatch | Self::MissingAccessToken => {
                StatusCode::UNAUTHORIZED
            }
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Credential(err) => Self::Credential(err),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<StateError> for ApiError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::Credential(err) => Self::Credential(err),
            StateError::Rejected => Self::InvalidState,
            StateError::Sign(err) => Self::Internal(err.to_string()),
            err @ StateError::Ttl(_) => Self::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            Self::Credential(err) => {
                error!("Critical: credential unavailable: {err}");
                json!({"error": "Internal Server Error"})
            }
            Self::Upstream { message, source } => {
                error!("{message}: {source}");
                json!({"error": message})
            }
            Self::Downstream { status, details } => json!({
                "error": self.to_string(),
                "status_code": status.as_u16(),
                "details": details,
            }),
            Self::Internal(detail) => {
                error!("Internal error: {detail}");
                json!({"error": self.to_string()})
            }
            Self::InvalidState | Self::AudienceMismatch => {
                warn!("{self}");
                json!({"error": self.to_string()})
            }
            Self::Input(_) | Self::Authentication | Self::MissingAccessToken => {
                json!({"error": self.to_string()})
            }
        };

        (status, Json(body)).into_response()
    }
}
