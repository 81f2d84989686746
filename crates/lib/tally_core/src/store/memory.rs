//! In-process storage adapter.
//!
//! Keeps users, counters and settings behind a single async mutex, which gives
//! the same per-call atomicity the PostgreSQL adapter gets from transactions.
//! Used by the test suites and by tooling that runs without a database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{CredentialStore, SequenceGenerator, SettingsStore, StoreError, USERS_COUNTER};
use crate::auth::lockout::failure_transition;
use crate::models::auth::{LockoutState, NewUser, ProfileUpdate, PublicUser, Role, User};
use crate::models::config::SettingValue;

#[derive(Default)]
struct State {
    users: HashMap<i64, User>,
    counters: HashMap<String, i64>,
    settings: HashMap<String, SettingValue>,
}

impl State {
    fn increment(&mut self, name: &str) -> i64 {
        let value = self.counters.entry(name.to_string()).or_insert(0);
        *value += 1;
        *value
    }

    fn by_email(&self, email: &str) -> Option<&User> {
        self.users.values().find(|u| u.profile.email == email)
    }

    fn user_mut(&mut self, id: i64) -> Option<&mut User> {
        self.users.get_mut(&id)
    }
}

/// Switches that make selected operations fail as if the database were down.
#[derive(Default)]
pub struct FailPoints {
    pub lockout_writes: AtomicBool,
    pub settings_reads: AtomicBool,
    pub user_reads: AtomicBool,
}

impl FailPoints {
    fn check(flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Db(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

/// Storage held entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    pub fail: FailPoints,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SequenceGenerator for MemoryStore {
    async fn next_value(&self, counter: &str) -> Result<i64, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state.increment(counter))
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<PublicUser>, StoreError> {
        FailPoints::check(&self.fail.user_reads)?;
        let state = self.state.lock().await;
        Ok(state.by_email(email).map(|u| u.profile.clone()))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PublicUser>, StoreError> {
        FailPoints::check(&self.fail.user_reads)?;
        let state = self.state.lock().await;
        Ok(state.users.get(&id).map(|u| u.profile.clone()))
    }

    async fn find_for_authentication(&self, email: &str) -> Result<Option<User>, StoreError> {
        FailPoints::check(&self.fail.user_reads)?;
        let state = self.state.lock().await;
        Ok(state.by_email(email).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<i64, StoreError> {
        let mut state = self.state.lock().await;
        if state.by_email(&user.email).is_some() {
            return Err(StoreError::DuplicateEmail);
        }
        if state.users.values().any(|u| u.profile.username == user.username) {
            return Err(StoreError::DuplicateUsername);
        }

        let id = state.increment(USERS_COUNTER);
        let now = Utc::now();
        let profile = PublicUser {
            id,
            name: user.name,
            username: user.username,
            email: user.email,
            role: user.role,
            email_verified: user.email_verified,
            failed_login_attempts: 0,
            account_locked_until: None,
            last_login: None,
            password_updated_at: user.password_hash.as_ref().map(|_| now),
            email_verified_at: user.email_verified.then_some(now),
            created_at: now,
            updated_at: now,
        };
        state.users.insert(
            id,
            User {
                profile,
                password_hash: user.password_hash,
            },
        );
        Ok(id)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(user) = state.user_mut(id) {
            let now = Utc::now();
            user.password_hash = Some(password_hash.to_string());
            user.profile.password_updated_at = Some(now);
            user.profile.updated_at = now;
        }
        Ok(())
    }

    async fn update_lockout_state(
        &self,
        id: i64,
        failed_attempts: i32,
        locked_until: Option<DateTime<Utc>>,
        touch_last_login: bool,
    ) -> Result<(), StoreError> {
        FailPoints::check(&self.fail.lockout_writes)?;
        let mut state = self.state.lock().await;
        if let Some(user) = state.user_mut(id) {
            let now = Utc::now();
            user.profile.failed_login_attempts = failed_attempts;
            user.profile.account_locked_until = locked_until;
            if touch_last_login {
                user.profile.last_login = Some(now);
            }
            user.profile.updated_at = now;
        }
        Ok(())
    }

    async fn record_failed_attempt(
        &self,
        id: i64,
        max_attempts: i32,
        lock_until: DateTime<Utc>,
    ) -> Result<Option<LockoutState>, StoreError> {
        FailPoints::check(&self.fail.lockout_writes)?;
        let mut state = self.state.lock().await;
        let Some(user) = state.user_mut(id) else {
            return Ok(None);
        };
        let current = LockoutState {
            failed_attempts: user.profile.failed_login_attempts,
            locked_until: user.profile.account_locked_until,
        };
        let next = failure_transition(current, max_attempts, lock_until);
        user.profile.failed_login_attempts = next.failed_attempts;
        user.profile.account_locked_until = next.locked_until;
        user.profile.updated_at = Utc::now();
        Ok(Some(next))
    }

    async fn mark_email_verified(&self, id: i64) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(user) = state.user_mut(id) {
            let now = Utc::now();
            user.profile.email_verified = true;
            user.profile.email_verified_at = Some(now);
            user.profile.updated_at = now;
        }
        Ok(())
    }

    async fn update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        for other in state.users.values().filter(|u| u.profile.id != id) {
            if update.email.as_ref() == Some(&other.profile.email) {
                return Err(StoreError::DuplicateEmail);
            }
            if update.username.as_ref() == Some(&other.profile.username) {
                return Err(StoreError::DuplicateUsername);
            }
        }

        if let Some(user) = state.user_mut(id) {
            if let Some(name) = &update.name {
                user.profile.name = Some(name.clone());
            }
            if let Some(username) = &update.username {
                user.profile.username = username.clone();
            }
            if let Some(email) = &update.email {
                user.profile.email = email.clone();
            }
            user.profile.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_user(&self, id: i64) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let Some(target) = state.users.get(&id) else {
            return Ok(false);
        };
        if target.profile.role == Role::Admin {
            let admins = state
                .users
                .values()
                .filter(|u| u.profile.role == Role::Admin)
                .count();
            if admins <= 1 {
                return Err(StoreError::LastAdmin);
            }
        }
        state.users.remove(&id);
        Ok(true)
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_setting(&self, key: &str) -> Result<Option<SettingValue>, StoreError> {
        FailPoints::check(&self.fail.settings_reads)?;
        let state = self.state.lock().await;
        Ok(state.settings.get(key).cloned())
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.settings.insert(
            key.to_string(),
            SettingValue {
                key: key.to_string(),
                value: value.to_string(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    fn new_user(email: &str, role: Role) -> NewUser {
        NewUser {
            name: Some("Test".into()),
            username: email.to_string(),
            email: email.to_string(),
            password_hash: Some("hash".into()),
            role,
            email_verified: false,
        }
    }

    #[tokio::test]
    async fn first_counter_value_is_one() {
        let store = MemoryStore::new();
        assert_eq!(store.next_value("invoices").await.unwrap(), 1);
        assert_eq!(store.next_value("invoices").await.unwrap(), 2);
        assert_eq!(store.next_value("clients").await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_next_value_yields_consecutive_distinct_values() {
        let store = Arc::new(MemoryStore::new());
        let k = 64;

        let handles = (0..k).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.next_value("users").await })
        });
        let values: Vec<i64> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();

        let distinct: HashSet<i64> = values.iter().copied().collect();
        assert_eq!(distinct.len(), k);
        assert_eq!(distinct, (1..=k as i64).collect::<HashSet<_>>());
    }

    #[tokio::test]
    async fn create_mints_ids_from_users_counter() {
        let store = MemoryStore::new();
        let a = store.create(new_user("a@example.test", Role::User)).await.unwrap();
        let b = store.create(new_user("b@example.test", Role::User)).await.unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(store.next_value(USERS_COUNTER).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let store = MemoryStore::new();
        store.create(new_user("a@example.test", Role::User)).await.unwrap();
        let err = store
            .create(NewUser {
                username: "other".into(),
                ..new_user("a@example.test", Role::User)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn delete_refuses_last_admin() {
        let store = MemoryStore::new();
        let admin = store.create(new_user("root@example.test", Role::Admin)).await.unwrap();
        let user = store.create(new_user("u@example.test", Role::User)).await.unwrap();

        assert!(matches!(
            store.delete_user(admin).await,
            Err(StoreError::LastAdmin)
        ));
        assert!(store.delete_user(user).await.unwrap());
        assert!(!store.delete_user(user).await.unwrap());

        let second = store.create(new_user("root2@example.test", Role::Admin)).await.unwrap();
        assert!(store.delete_user(admin).await.unwrap());
        assert!(store.find_by_id(second).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_failed_attempts_are_all_counted() {
        let store = Arc::new(MemoryStore::new());
        let id = store.create(new_user("a@example.test", Role::User)).await.unwrap();
        let lock_until = Utc::now() + chrono::Duration::minutes(15);

        let handles = (0..10).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.record_failed_attempt(id, 5, lock_until).await })
        });
        for r in futures::future::join_all(handles).await {
            assert!(r.unwrap().unwrap().is_some());
        }

        let user = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.failed_login_attempts, 10);
        assert_eq!(user.account_locked_until, Some(lock_until));
        assert_eq!(store.record_failed_attempt(999, 5, lock_until).await.unwrap(), None);
    }

    #[tokio::test]
    async fn public_lookups_never_carry_the_hash() {
        let store = MemoryStore::new();
        store.create(new_user("a@example.test", Role::User)).await.unwrap();
        let auth = store.find_for_authentication("a@example.test").await.unwrap().unwrap();
        assert_eq!(auth.password_hash.as_deref(), Some("hash"));
        let json = serde_json::to_value(store.find_by_id(auth.id()).await.unwrap().unwrap()).unwrap();
        assert!(json.get("password_hash").is_none());
    }
}
