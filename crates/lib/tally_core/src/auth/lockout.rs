//! Account lockout state machine.
//!
//! An account is Locked while `account_locked_until` lies strictly in the
//! future and Unlocked otherwise. It returns to Unlocked either when that
//! moment passes or on the next successful authentication.
//!
//! Failed attempts are counted by the store in a single atomic update, so
//! concurrent bad guesses each add one.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::config::SecurityPolicyProvider;
pub use crate::models::auth::LockoutState;
use crate::models::auth::PublicUser;
use crate::models::config::LockoutSettings;
use crate::store::{CredentialStore, StoreError};

/// Whether a lock timestamp is still in force at `now`.
pub fn is_locked(locked_until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    locked_until.is_some_and(|until| until > now)
}

/// When a lock armed at `now` expires. Saturates at the latest representable
/// instant instead of overflowing.
pub fn lock_deadline(settings: LockoutSettings, now: DateTime<Utc>) -> DateTime<Utc> {
    Duration::try_milliseconds(settings.lockout_duration_ms)
        .and_then(|window| now.checked_add_signed(window))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// State after one more failed attempt. The lock is only (re)armed once the
/// counter reaches `max_attempts`; below it the previous timestamp is kept.
pub fn failure_transition(
    current: LockoutState,
    max_attempts: i32,
    lock_until: DateTime<Utc>,
) -> LockoutState {
    let failed_attempts = current.failed_attempts.saturating_add(1);
    let locked_until = if failed_attempts >= max_attempts {
        Some(lock_until)
    } else {
        current.locked_until
    };
    LockoutState {
        failed_attempts,
        locked_until,
    }
}

/// State after a successful authentication.
pub fn success_transition() -> LockoutState {
    LockoutState {
        failed_attempts: 0,
        locked_until: None,
    }
}

/// Applies lockout transitions and persists them through the credential store.
pub struct LockoutPolicy {
    store: Arc<dyn CredentialStore>,
    policy: Arc<SecurityPolicyProvider>,
}

impl LockoutPolicy {
    pub fn new(store: Arc<dyn CredentialStore>, policy: Arc<SecurityPolicyProvider>) -> Self {
        Self { store, policy }
    }

    /// Whether `user` is locked right now.
    pub fn is_locked(&self, user: &PublicUser) -> bool {
        is_locked(user.account_locked_until, Utc::now())
    }

    /// Count a failed attempt, locking the account once the threshold is hit.
    /// Returns `None` when the user no longer exists.
    pub async fn record_failure(
        &self,
        user: &PublicUser,
    ) -> Result<Option<LockoutState>, StoreError> {
        let settings = self.policy.lockout_policy().await;
        let lock_until = lock_deadline(settings, Utc::now());

        let next = self
            .store
            .record_failed_attempt(user.id, settings.max_attempts, lock_until)
            .await?;

        if let Some(state) = next
            && state.failed_attempts == settings.max_attempts
        {
            warn!(
                user_id = user.id,
                attempts = state.failed_attempts,
                locked_until = ?state.locked_until,
                "account locked after repeated failed logins"
            );
        }
        Ok(next)
    }

    /// Reset the counter, clear any lock and stamp `last_login`.
    pub async fn record_success(&self, user: &PublicUser) -> Result<(), StoreError> {
        let next = success_transition();
        self.store
            .update_lockout_state(user.id, next.failed_attempts, next.locked_until, true)
            .await
    }

    /// Reset the counter and clear any lock without touching `last_login`.
    pub async fn release(&self, user: &PublicUser) -> Result<(), StoreError> {
        let next = success_transition();
        self.store
            .update_lockout_state(user.id, next.failed_attempts, next.locked_until, false)
            .await?;
        if user.failed_login_attempts > 0 || user.account_locked_until.is_some() {
            info!(user_id = user.id, "lockout state cleared");
        }
        Ok(())
    }
}
