//! Effective security policy. A persisted override wins over the process default.
//!
//! Resolution never fails: a missing, malformed or unreadable override falls
//! back to the process default and is logged.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use tracing::warn;

use super::cache::SettingsCache;
use crate::models::config::{
    LOCKOUT_DURATION_MS_KEY, LockoutSettings, MAX_FAILED_ATTEMPTS_KEY,
    REQUIRE_EMAIL_VERIFICATION_KEY, SecurityDefaults,
};
use crate::store::{SettingsStore, StoreError};

/// Resolves lockout and email-verification settings.
pub struct SecurityPolicyProvider {
    settings: Arc<dyn SettingsStore>,
    cache: RwLock<SettingsCache>,
    defaults: SecurityDefaults,
}

impl SecurityPolicyProvider {
    pub fn new(settings: Arc<dyn SettingsStore>, defaults: SecurityDefaults) -> Self {
        Self::with_cache(settings, defaults, SettingsCache::new())
    }

    pub fn with_cache(
        settings: Arc<dyn SettingsStore>,
        defaults: SecurityDefaults,
        cache: SettingsCache,
    ) -> Self {
        Self {
            settings,
            cache: RwLock::new(cache),
            defaults,
        }
    }

    pub fn defaults(&self) -> &SecurityDefaults {
        &self.defaults
    }

    /// Effective lockout threshold and window.
    pub async fn lockout_policy(&self) -> LockoutSettings {
        let fallback = self.defaults.lockout;
        let max_attempts = self
            .resolve(MAX_FAILED_ATTEMPTS_KEY, fallback.max_attempts, parse_positive::<i32>)
            .await;
        let lockout_duration_ms = self
            .resolve(
                LOCKOUT_DURATION_MS_KEY,
                fallback.lockout_duration_ms,
                parse_lockout_window,
            )
            .await;
        LockoutSettings {
            max_attempts,
            lockout_duration_ms,
        }
    }

    /// Whether login and protected requests require a verified email.
    pub async fn is_email_verification_required(&self) -> bool {
        self.resolve(
            REQUIRE_EMAIL_VERIFICATION_KEY,
            self.defaults.require_email_verification,
            parse_bool,
        )
        .await
    }

    /// Like [`Self::is_email_verification_required`], but surfaces store
    /// failures so the caller can decide how to degrade.
    pub async fn try_is_email_verification_required(&self) -> Result<bool, StoreError> {
        let fallback = self.defaults.require_email_verification;
        let raw = self.lookup(REQUIRE_EMAIL_VERIFICATION_KEY).await?;
        Ok(raw.and_then(|v| parse_bool(&v)).unwrap_or(fallback))
    }

    /// Persist an override and drop its cached value.
    pub async fn set_override(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.settings.put_setting(key, value).await?;
        self.cache.write().await.invalidate(key);
        Ok(())
    }

    /// Drop every cached override.
    pub async fn invalidate_cache(&self) {
        self.cache.write().await.clear();
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    async fn resolve<T: Copy + std::fmt::Debug>(
        &self,
        key: &str,
        fallback: T,
        parse: fn(&str) -> Option<T>,
    ) -> T {
        match self.lookup(key).await {
            Ok(None) => fallback,
            Ok(Some(raw)) => parse(&raw).unwrap_or_else(|| {
                warn!(key, value = %raw, ?fallback, "ignoring malformed setting override");
                fallback
            }),
            Err(e) => {
                warn!(key, error = %e, ?fallback, "setting lookup failed, using default");
                fallback
            }
        }
    }

    async fn lookup(&self, key: &str) -> Result<Option<String>, StoreError> {
        {
            let c = self.cache.read().await;
            if let Some(v) = c.get(key) {
                return Ok(v);
            }
        }

        let value = self.settings.get_setting(key).await?.map(|s| s.value);
        self.cache.write().await.set(key, value.clone());
        Ok(value)
    }
}

fn parse_positive<T>(raw: &str) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    raw.trim().parse::<T>().ok().filter(|v| *v > T::default())
}

/// A positive window that can still be added to the current time.
fn parse_lockout_window(raw: &str) -> Option<i64> {
    parse_positive::<i64>(raw).filter(|ms| {
        Duration::try_milliseconds(*ms)
            .and_then(|window| Utc::now().checked_add_signed(window))
            .is_some()
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
