//! Transactional named counters.
//!
//! The upsert takes a row lock on the counter, so concurrent increments of the
//! same name serialize in the database rather than in the application.

use sqlx::{PgPool, Postgres, Transaction};

use crate::store::StoreError;

/// Increment `name` in its own transaction and return the new value.
pub async fn next_value(pool: &PgPool, name: &str) -> Result<i64, StoreError> {
    let mut tx = pool.begin().await?;
    let value = increment_in(&mut tx, name).await?;
    tx.commit().await?;
    Ok(value)
}

/// Increment `name` inside a caller-owned transaction. The value only becomes
/// durable when the caller commits.
pub async fn increment_in(
    tx: &mut Transaction<'_, Postgres>,
    name: &str,
) -> Result<i64, StoreError> {
    let value = sqlx::query_scalar::<_, i64>(
        "INSERT INTO counters (name, value) VALUES ($1, 1) \
         ON CONFLICT (name) DO UPDATE SET value = counters.value + 1 \
         RETURNING value",
    )
    .bind(name)
    .fetch_one(&mut **tx)
    .await?;
    Ok(value)
}
