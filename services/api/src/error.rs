//! services/api/src/error.rs
//!
//! Error types for the API service: `ApiError` for startup failures in the
//! binary, `HttpError` for request-level failures rendered into the response
//! envelope.

use achievement_core::{AchievementStatus, AuthError, WorkflowError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::config::ConfigError;
use crate::web::envelope::Envelope;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// A failed schema migration.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for handler return types.
pub type HttpResult<T> = Result<T, HttpError>;

/// A request failure with its HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// The achievement is not in a state that allows the operation.
    #[error("Achievement is {current}, only drafts can be changed")]
    StateConflict { current: AchievementStatus },

    /// Details are logged where the error is raised, never sent to the client.
    #[error("Internal server error")]
    Internal,
}

impl HttpError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::StateConflict { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::StateConflict { .. } => "invalid_state",
            Self::Internal => "internal_error",
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let data = match &self {
            Self::StateConflict { current } => Some(json!({ "current_status": current })),
            _ => None,
        };
        let body = Envelope {
            success: false,
            message: self.to_string(),
            data,
            error: Some(self.code().to_string()),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<WorkflowError> for HttpError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::NotAStudent => Self::Forbidden(e.to_string()),
            WorkflowError::Forbidden => Self::Forbidden(e.to_string()),
            WorkflowError::NotFound(_) => Self::NotFound(e.to_string()),
            WorkflowError::InvalidState { current } => Self::StateConflict { current },
            WorkflowError::Validation(msg) => Self::Validation(msg),
            WorkflowError::Storage(e) => {
                error!(error = %e, "achievement store failure");
                Self::Internal
            }
        }
    }
}

impl From<AuthError> for HttpError {
    fn from(e: AuthError) -> Self {
        match e {
            // Unknown account and wrong password read the same to the client.
            AuthError::NotFound | AuthError::InvalidCredentials => {
                Self::Unauthorized("Invalid username or password".into())
            }
            AuthError::AccountDisabled => Self::Forbidden(e.to_string()),
            AuthError::Malformed
            | AuthError::InvalidSignature
            | AuthError::Expired
            | AuthError::WrongTokenType { .. } => Self::Unauthorized(e.to_string()),
            AuthError::Internal(msg) => {
                error!(error = %msg, "auth failure");
                Self::Internal
            }
            AuthError::Store(e) => {
                error!(error = %e, "identity store failure");
                Self::Internal
            }
        }
    }
}
