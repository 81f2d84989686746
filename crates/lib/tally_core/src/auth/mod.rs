//! Authentication and account-security logic.
//!
//! Password hashing, session and action tokens, lockout transitions, and the
//! [`service::AuthService`] that composes them over the storage traits.

pub mod action_token;
pub mod jwt;
pub mod lockout;
pub mod password;
pub mod service;

#[cfg(test)]
mod tests;

use thiserror::Error;

use crate::store::StoreError;

/// Authentication errors, one variant per outcome the boundary must tell
/// apart.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error(
        "Account is temporarily locked due to too many failed login attempts. Please try again later."
    )]
    AccountLocked,

    #[error("Please verify your email address before logging in")]
    EmailVerificationRequired,

    /// Missing, invalid or expired session, or a session for a user that no
    /// longer exists.
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => AuthError::Validation("Email already registered".into()),
            StoreError::DuplicateUsername => AuthError::Validation("Username already taken".into()),
            StoreError::LastAdmin => {
                AuthError::Forbidden("Cannot delete the last admin account".into())
            }
            StoreError::Corrupt(msg) => AuthError::Internal(format!("corrupt row: {msg}")),
            StoreError::Db(e) => AuthError::Internal(format!("store: {e}")),
        }
    }
}

/// Token decoding and validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Invalid token")]
    Invalid,

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token type")]
    WrongType,

    #[error("Malformed token")]
    Malformed,

    #[error("Token encoding failed: {0}")]
    Encode(String),
}
