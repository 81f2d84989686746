//! Request extractors.

use axum::extract::FromRequest;
use axum::extract::rejection::JsonRejection;

use crate::error::AppError;

/// `axum::Json` whose rejection renders as the standard error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}
