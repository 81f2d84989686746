//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tally_core::auth::AuthError;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Email verification required: {0}")]
    EmailVerificationRequired(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Locked: {0}")]
    Locked(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.as_str()),
            AppError::EmailVerificationRequired(m) | AppError::Forbidden(m) => {
                (StatusCode::FORBIDDEN, m.as_str())
            }
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m.as_str()),
            AppError::Locked(m) => (StatusCode::LOCKED, m.as_str()),
            AppError::Internal(detail) => {
                error!(detail = %detail, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };
        let body = Json(ErrorResponse {
            success: false,
            error: message.to_string(),
            requires_email_verification: matches!(self, AppError::EmailVerificationRequired(_))
                .then_some(true),
        });
        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        let message = e.to_string();
        match e {
            AuthError::Validation(msg) => AppError::Validation(msg),
            AuthError::InvalidCredentials => AppError::Unauthorized(message),
            AuthError::AccountLocked => AppError::Locked(message),
            AuthError::EmailVerificationRequired => AppError::EmailVerificationRequired(message),
            AuthError::Unauthenticated(msg) => AppError::Unauthorized(msg),
            AuthError::NotFound(msg) => AppError::NotFound(msg),
            AuthError::Forbidden(msg) => AppError::Forbidden(msg),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_statuses() {
        let cases = [
            (AuthError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::AccountLocked, StatusCode::LOCKED),
            (AuthError::EmailVerificationRequired, StatusCode::FORBIDDEN),
            (AuthError::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (AuthError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AuthError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (AuthError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}
