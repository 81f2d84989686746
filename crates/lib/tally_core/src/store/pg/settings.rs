//! Settings overrides.

use sqlx::PgPool;

use crate::models::config::SettingValue;
use crate::store::StoreError;

/// Fetch a persisted override by key.
pub async fn get_setting(pool: &PgPool, key: &str) -> Result<Option<SettingValue>, StoreError> {
    let row = sqlx::query_as::<_, (String, String, chrono::DateTime<chrono::Utc>)>(
        "SELECT key, value, updated_at FROM settings WHERE key = $1",
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(key, value, updated_at)| SettingValue {
        key,
        value,
        updated_at,
    }))
}

/// Insert or replace an override.
pub async fn upsert_setting(pool: &PgPool, key: &str, value: &str) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES ($1, $2, now()) \
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}
