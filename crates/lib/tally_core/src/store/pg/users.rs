//! User queries.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::sequence::increment_in;
use crate::models::auth::{LockoutState, NewUser, ProfileUpdate, PublicUser, Role, User};
use crate::store::{StoreError, USERS_COUNTER};

/// Columns shared by every `PublicUser` read, in tuple order.
const PUBLIC_COLUMNS: &str = "id, name, username, email, role, email_verified, \
     failed_login_attempts, account_locked_until, last_login, password_updated_at, \
     email_verified_at, created_at, updated_at";

type PublicRow = (
    i64,
    Option<String>,
    String,
    String,
    String,
    i16,
    i32,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
    DateTime<Utc>,
    DateTime<Utc>,
);

/// Fetch a user by email, without the password hash.
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<PublicUser>, StoreError> {
    let sql = format!("SELECT {PUBLIC_COLUMNS} FROM users WHERE email = $1");
    let row = sqlx::query_as::<_, PublicRow>(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await?;
    row.map(parse_public_row).transpose()
}

/// Fetch a user by id, without the password hash.
pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<PublicUser>, StoreError> {
    let sql = format!("SELECT {PUBLIC_COLUMNS} FROM users WHERE id = $1");
    let row = sqlx::query_as::<_, PublicRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.map(parse_public_row).transpose()
}

/// Fetch a user by email together with the password hash.
pub async fn find_for_authentication(
    pool: &PgPool,
    email: &str,
) -> Result<Option<User>, StoreError> {
    let sql = format!("SELECT {PUBLIC_COLUMNS}, password_hash FROM users WHERE email = $1");
    let row = sqlx::query_as::<
        _,
        (
            i64,
            Option<String>,
            String,
            String,
            String,
            i16,
            i32,
            Option<DateTime<Utc>>,
            Option<DateTime<Utc>>,
            Option<DateTime<Utc>>,
            Option<DateTime<Utc>>,
            DateTime<Utc>,
            DateTime<Utc>,
            Option<String>,
        ),
    >(&sql)
    .bind(email)
    .fetch_optional(pool)
    .await?;

    row.map(|r| {
        let profile =
            parse_public_row((r.0, r.1, r.2, r.3, r.4, r.5, r.6, r.7, r.8, r.9, r.10, r.11, r.12))?;
        Ok(User {
            profile,
            password_hash: r.13,
        })
    })
    .transpose()
}

/// Insert a new user. The id is minted from the `users` counter inside the
/// same transaction as the insert.
pub async fn create_user(pool: &PgPool, user: &NewUser) -> Result<i64, StoreError> {
    let mut tx = pool.begin().await?;

    if email_exists(&mut tx, &user.email).await? {
        return Err(StoreError::DuplicateEmail);
    }

    let id = increment_in(&mut tx, USERS_COUNTER).await?;

    sqlx::query(
        "INSERT INTO users (id, name, username, email, password_hash, role, email_verified, \
         email_verified_at, password_updated_at, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, \
         CASE WHEN $7 = 1 THEN now() ELSE NULL END, \
         CASE WHEN $5::text IS NULL THEN NULL ELSE now() END, now(), now())",
    )
    .bind(id)
    .bind(user.name.as_deref())
    .bind(&user.username)
    .bind(&user.email)
    .bind(user.password_hash.as_deref())
    .bind(user.role.as_str())
    .bind(i16::from(user.email_verified))
    .execute(&mut *tx)
    .await
    .map_err(map_unique_violation)?;

    tx.commit().await?;
    Ok(id)
}

/// Replace the password hash.
pub async fn update_password(pool: &PgPool, id: i64, password_hash: &str) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE users SET password_hash = $2, password_updated_at = now(), updated_at = now() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(password_hash)
    .execute(pool)
    .await?;
    Ok(())
}

/// Write the failed-attempt counter and lock timestamp together.
pub async fn update_lockout_state(
    pool: &PgPool,
    id: i64,
    failed_attempts: i32,
    locked_until: Option<DateTime<Utc>>,
    touch_last_login: bool,
) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE users SET failed_login_attempts = $2, account_locked_until = $3, \
         last_login = CASE WHEN $4 THEN now() ELSE last_login END, updated_at = now() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(failed_attempts)
    .bind(locked_until)
    .bind(touch_last_login)
    .execute(pool)
    .await?;
    Ok(())
}

/// Count one failed attempt. The increment and the threshold check read the
/// row inside the same `UPDATE`, so concurrent failures serialize on the row
/// lock and none is lost.
pub async fn record_failed_attempt(
    pool: &PgPool,
    id: i64,
    max_attempts: i32,
    lock_until: DateTime<Utc>,
) -> Result<Option<LockoutState>, StoreError> {
    let row = sqlx::query_as::<_, (i32, Option<DateTime<Utc>>)>(
        "UPDATE users SET failed_login_attempts = failed_login_attempts + 1, \
         account_locked_until = CASE WHEN failed_login_attempts + 1 >= $2 THEN $3 \
         ELSE account_locked_until END, updated_at = now() \
         WHERE id = $1 \
         RETURNING failed_login_attempts, account_locked_until",
    )
    .bind(id)
    .bind(max_attempts)
    .bind(lock_until)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(failed_attempts, locked_until)| LockoutState {
        failed_attempts,
        locked_until,
    }))
}

/// Flag the email address as verified.
pub async fn mark_email_verified(pool: &PgPool, id: i64) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE users SET email_verified = 1, email_verified_at = now(), updated_at = now() \
         WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Apply a partial profile update. Absent fields keep their current value.
pub async fn update_profile(
    pool: &PgPool,
    id: i64,
    update: &ProfileUpdate,
) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE users SET name = COALESCE($2, name), username = COALESCE($3, username), \
         email = COALESCE($4, email), updated_at = now() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(update.name.as_deref())
    .bind(update.username.as_deref())
    .bind(update.email.as_deref())
    .execute(pool)
    .await
    .map_err(map_unique_violation)?;
    Ok(())
}

/// Delete a user unless it is the last admin.
pub async fn delete_user(pool: &PgPool, id: i64) -> Result<bool, StoreError> {
    let mut tx = pool.begin().await?;

    let role = sqlx::query_scalar::<_, String>("SELECT role FROM users WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

    let Some(role) = role else {
        return Ok(false);
    };

    if role == Role::Admin.as_str() {
        let admins = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = 'admin'")
            .fetch_one(&mut *tx)
            .await?;
        if admins <= 1 {
            return Err(StoreError::LastAdmin);
        }
    }

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Internal
// ---------------------------------------------------------------------------

async fn email_exists(tx: &mut Transaction<'_, Postgres>, email: &str) -> Result<bool, StoreError> {
    let exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(&mut **tx)
            .await?;
    Ok(exists)
}

/// Translate unique-constraint violations into domain errors.
fn map_unique_violation(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e
        && db.is_unique_violation()
    {
        return match db.constraint() {
            Some("users_username_key") => StoreError::DuplicateUsername,
            _ => StoreError::DuplicateEmail,
        };
    }
    StoreError::Db(e)
}

fn parse_public_row(r: PublicRow) -> Result<PublicUser, StoreError> {
    let role = Role::parse(&r.4).ok_or_else(|| StoreError::Corrupt(format!("role {:?}", r.4)))?;
    Ok(PublicUser {
        id: r.0,
        name: r.1,
        username: r.2,
        email: r.3,
        role,
        email_verified: r.5 != 0,
        failed_login_attempts: r.6,
        account_locked_until: r.7,
        last_login: r.8,
        password_updated_at: r.9,
        email_verified_at: r.10,
        created_at: r.11,
        updated_at: r.12,
    })
}
