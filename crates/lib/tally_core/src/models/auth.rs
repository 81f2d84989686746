//! Authentication domain models.
//!
//! These mirror the `users` table plus the transient token payloads. The API
//! layer serializes `PublicUser` directly, so field names stay snake_case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Flat account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Viewer,
}

impl Role {
    /// Database text representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Viewer => "viewer",
        }
    }

    /// Parse the database text representation. Unknown values map to `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User record without credential material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i64,
    pub name: Option<String>,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub email_verified: bool,
    pub failed_login_attempts: i32,
    pub account_locked_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub password_updated_at: Option<DateTime<Utc>>,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full user row, including the password hash.
///
/// Only returned by `CredentialStore::find_for_authentication`; never
/// serialized.
#[derive(Debug, Clone)]
pub struct User {
    pub profile: PublicUser,
    /// `None` for identity-provider-only accounts.
    pub password_hash: Option<String>,
}

impl User {
    pub fn id(&self) -> i64 {
        self.profile.id
    }
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        user.profile
    }
}

/// Persisted lockout fields of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutState {
    pub failed_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
}

/// Fields written when a user row is created.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: Option<String>,
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: Role,
    pub email_verified: bool,
}

/// Partial profile update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.username.is_none() && self.email.is_none()
    }
}

/// Token `type` claim carried by session tokens.
pub const ACCESS_TOKEN_TYPE: &str = "access";

/// Claims embedded in signed session tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    #[serde(rename = "type")]
    pub token_type: String,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

/// Purpose of an ephemeral action token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTokenKind {
    PasswordReset,
    EmailVerification,
}

impl ActionTokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionTokenKind::PasswordReset => "password_reset",
            ActionTokenKind::EmailVerification => "email_verification",
        }
    }
}

/// Payload of a password-reset or email-verification token.
///
/// `kind` is kept as a raw string so that a token of an unknown type still
/// decodes and is rejected by the type check rather than as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTokenPayload {
    pub email: String,
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    /// Issued at (unix milliseconds).
    pub iat: i64,
    /// Expiry (unix milliseconds).
    pub exp: i64,
}
