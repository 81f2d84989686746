//! Security configuration models.
//!
//! Process defaults come from the environment; persisted rows in the
//! `settings` table override them per deployment.

use serde::{Deserialize, Serialize};

/// Settings key: failed attempts before an account is locked.
pub const MAX_FAILED_ATTEMPTS_KEY: &str = "security.maxFailedLoginAttempts";
/// Settings key: lockout window in milliseconds.
pub const LOCKOUT_DURATION_MS_KEY: &str = "security.lockoutDurationMs";
/// Settings key: whether login requires a verified email.
pub const REQUIRE_EMAIL_VERIFICATION_KEY: &str = "security.requireEmailVerification";

/// Effective lockout parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutSettings {
    pub max_attempts: i32,
    pub lockout_duration_ms: i64,
}

impl Default for LockoutSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_duration_ms: 15 * 60 * 1000,
        }
    }
}

/// Process-level security defaults, used whenever no usable override exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityDefaults {
    pub lockout: LockoutSettings,
    pub require_email_verification: bool,
}

impl Default for SecurityDefaults {
    fn default() -> Self {
        Self {
            lockout: LockoutSettings::default(),
            require_email_verification: false,
        }
    }
}

/// Persisted settings row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingValue {
    pub key: String,
    pub value: String,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
