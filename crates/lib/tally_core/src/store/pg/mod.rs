//! PostgreSQL adapter.
//!
//! Query functions take a `&PgPool` like the rest of the crate; `PgStore`
//! wraps a pool and exposes them through the storage traits.

pub mod sequence;
pub mod settings;
pub mod users;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{CredentialStore, SequenceGenerator, SettingsStore, StoreError};
use crate::models::auth::{LockoutState, NewUser, ProfileUpdate, PublicUser, User};
use crate::models::config::SettingValue;

/// Storage backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SequenceGenerator for PgStore {
    async fn next_value(&self, counter: &str) -> Result<i64, StoreError> {
        sequence::next_value(&self.pool, counter).await
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<PublicUser>, StoreError> {
        users::find_by_email(&self.pool, email).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PublicUser>, StoreError> {
        users::find_by_id(&self.pool, id).await
    }

    async fn find_for_authentication(&self, email: &str) -> Result<Option<User>, StoreError> {
        users::find_for_authentication(&self.pool, email).await
    }

    async fn create(&self, user: NewUser) -> Result<i64, StoreError> {
        users::create_user(&self.pool, &user).await
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), StoreError> {
        users::update_password(&self.pool, id, password_hash).await
    }

    async fn update_lockout_state(
        &self,
        id: i64,
        failed_attempts: i32,
        locked_until: Option<DateTime<Utc>>,
        touch_last_login: bool,
    ) -> Result<(), StoreError> {
        users::update_lockout_state(&self.pool, id, failed_attempts, locked_until, touch_last_login)
            .await
    }

    async fn record_failed_attempt(
        &self,
        id: i64,
        max_attempts: i32,
        lock_until: DateTime<Utc>,
    ) -> Result<Option<LockoutState>, StoreError> {
        users::record_failed_attempt(&self.pool, id, max_attempts, lock_until).await
    }

    async fn mark_email_verified(&self, id: i64) -> Result<(), StoreError> {
        users::mark_email_verified(&self.pool, id).await
    }

    async fn update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<(), StoreError> {
        users::update_profile(&self.pool, id, update).await
    }

    async fn delete_user(&self, id: i64) -> Result<bool, StoreError> {
        users::delete_user(&self.pool, id).await
    }
}

#[async_trait]
impl SettingsStore for PgStore {
    async fn get_setting(&self, key: &str) -> Result<Option<SettingValue>, StoreError> {
        settings::get_setting(&self.pool, key).await
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        settings::upsert_setting(&self.pool, key, value).await
    }
}
