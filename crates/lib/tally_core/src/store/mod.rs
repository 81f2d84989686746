//! Storage capabilities used by the auth core.
//!
//! Each trait is narrow: the auth core never sees a generic
//! "table + column map" API. `pg` holds the PostgreSQL adapter and `memory`
//! an in-process adapter for tests and local tooling.

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::auth::{LockoutState, NewUser, ProfileUpdate, PublicUser, User};
use crate::models::config::SettingValue;

/// Counter name used when minting user ids.
pub const USERS_COUNTER: &str = "users";

/// Low-level store errors. Translated by the auth service before they reach
/// the HTTP boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Username already taken")]
    DuplicateUsername,

    #[error("Cannot delete the last admin account")]
    LastAdmin,

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Atomically incremented named counters.
#[async_trait]
pub trait SequenceGenerator: Send + Sync {
    /// Increment `counter` by one and return the new value. A missing
    /// counter is created with value 1.
    async fn next_value(&self, counter: &str) -> Result<i64, StoreError>;
}

/// Purpose-built reads and writes on the user record.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<PublicUser>, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<PublicUser>, StoreError>;

    /// The only lookup that returns the password hash.
    async fn find_for_authentication(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Insert a user with a freshly minted id from the `users` counter.
    async fn create(&self, user: NewUser) -> Result<i64, StoreError>;

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), StoreError>;

    /// Write both lockout fields in one statement. `touch_last_login` also
    /// stamps `last_login`.
    async fn update_lockout_state(
        &self,
        id: i64,
        failed_attempts: i32,
        locked_until: Option<DateTime<Utc>>,
        touch_last_login: bool,
    ) -> Result<(), StoreError>;

    /// Add one failed attempt in a single atomic step and, when the new count
    /// reaches `max_attempts`, set the lock to `lock_until`. Returns the
    /// stored result, or `None` when no row matched.
    async fn record_failed_attempt(
        &self,
        id: i64,
        max_attempts: i32,
        lock_until: DateTime<Utc>,
    ) -> Result<Option<LockoutState>, StoreError>;

    async fn mark_email_verified(&self, id: i64) -> Result<(), StoreError>;

    async fn update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<(), StoreError>;

    /// Returns `Ok(false)` when no row matched. Refuses to remove the last
    /// remaining admin.
    async fn delete_user(&self, id: i64) -> Result<bool, StoreError>;
}

/// Persisted key/value overrides.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<Option<SettingValue>, StoreError>;

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), StoreError>;
}
