//! API server configuration.

use tally_core::auth::action_token::{DEFAULT_RESET_WINDOW_SECS, DEFAULT_VERIFICATION_WINDOW_SECS};
use std::ops::RangeInclusive;

use tally_core::auth::jwt::{
    DEFAULT_ACCESS_TOKEN_TTL_SECS, MAX_ACCESS_TOKEN_TTL_SECS, resolve_jwt_secret,
};
use tally_core::auth::password::{BCRYPT_COST_RANGE, DEFAULT_BCRYPT_COST};
use tally_core::auth::service::AuthSettings;
use tally_core::models::config::{LockoutSettings, SecurityDefaults};
use tracing::warn;

/// Accepted range for time windows given in seconds: up to ten years.
const WINDOW_SECS_RANGE: RangeInclusive<i64> = 1..=MAX_ACCESS_TOKEN_TTL_SECS;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Access token lifetime in seconds.
    pub access_token_ttl_secs: i64,
    /// bcrypt cost factor and action-token windows.
    pub auth: AuthSettings,
    /// Security policy used when no persisted override exists.
    pub security: SecurityDefaults,
    /// Deployment mode (`APP_ENV`).
    pub app_env: String,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    /// Out-of-range numbers are logged and replaced by the default.
    ///
    /// | Variable                         | Default                           |
    /// |----------------------------------|-----------------------------------|
    /// | `BIND_ADDR`                      | `127.0.0.1:3100`                  |
    /// | `DATABASE_URL`                   | `postgres://localhost:5432/tally` |
    /// | `JWT_SECRET` / `AUTH_SECRET`     | generated & persisted to file     |
    /// | `ACCESS_TOKEN_TTL_SECS`          | `86400` (at most ten years)       |
    /// | `PASSWORD_RESET_WINDOW_SECS`     | `3600` (at most ten years)        |
    /// | `EMAIL_VERIFICATION_WINDOW_SECS` | `86400` (at most ten years)       |
    /// | `BCRYPT_COST`                    | `10` (4 to 31)                    |
    /// | `MAX_FAILED_LOGIN_ATTEMPTS`      | `5`                               |
    /// | `LOCKOUT_DURATION_MS`            | `900000` (at most ten years)      |
    /// | `REQUIRE_EMAIL_VERIFICATION`     | `false`                           |
    /// | `APP_ENV`                        | `development`                     |
    pub fn from_env() -> Self {
        let lockout = LockoutSettings::default();
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            pg_connection_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/tally".into()),
            jwt_secret: resolve_jwt_secret(),
            access_token_ttl_secs: env_in_range(
                "ACCESS_TOKEN_TTL_SECS",
                DEFAULT_ACCESS_TOKEN_TTL_SECS,
                WINDOW_SECS_RANGE,
            ),
            auth: AuthSettings {
                bcrypt_cost: env_in_range("BCRYPT_COST", DEFAULT_BCRYPT_COST, BCRYPT_COST_RANGE),
                reset_window_secs: env_in_range(
                    "PASSWORD_RESET_WINDOW_SECS",
                    DEFAULT_RESET_WINDOW_SECS,
                    WINDOW_SECS_RANGE,
                ),
                verification_window_secs: env_in_range(
                    "EMAIL_VERIFICATION_WINDOW_SECS",
                    DEFAULT_VERIFICATION_WINDOW_SECS,
                    WINDOW_SECS_RANGE,
                ),
            },
            security: SecurityDefaults {
                lockout: LockoutSettings {
                    max_attempts: env_number("MAX_FAILED_LOGIN_ATTEMPTS", lockout.max_attempts),
                    lockout_duration_ms: env_in_range(
                        "LOCKOUT_DURATION_MS",
                        lockout.lockout_duration_ms,
                        1..=MAX_ACCESS_TOKEN_TTL_SECS * 1000,
                    ),
                },
                require_email_verification: env_flag("REQUIRE_EMAIL_VERIFICATION", false),
            },
            app_env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
        }
    }

    /// Whether this deployment runs in production mode. Action tokens are
    /// only echoed in responses outside production.
    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }
}

fn env_number<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + PartialOrd + Default + Copy,
{
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(v) if v > T::default() => v,
            _ => {
                warn!(var = name, value = %raw, "ignoring invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_in_range<T>(name: &str, default: T, range: RangeInclusive<T>) -> T
where
    T: std::str::FromStr + PartialOrd + std::fmt::Debug + Copy,
{
    match std::env::var(name) {
        Ok(raw) => parse_in_range(&raw, &range).unwrap_or_else(|| {
            warn!(var = name, value = %raw, ?range, "ignoring out-of-range value, using default");
            default
        }),
        Err(_) => default,
    }
}

fn parse_in_range<T>(raw: &str, range: &RangeInclusive<T>) -> Option<T>
where
    T: std::str::FromStr + PartialOrd,
{
    raw.trim().parse::<T>().ok().filter(|v| range.contains(v))
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                warn!(var = name, value = %raw, "ignoring invalid flag, using default");
                default
            }
        },
        Err(_) => default,
    }
}
