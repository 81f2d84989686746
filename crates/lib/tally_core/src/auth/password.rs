//! Password hashing via bcrypt.
//!
//! bcrypt is CPU-bound, so the async variants run on the blocking pool and
//! never stall the request executor.

use super::AuthError;

/// Default bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Cost factors bcrypt accepts.
pub const BCRYPT_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Hash a password with bcrypt.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost).map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Verify a password against a bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    bcrypt::verify(password, hash).map_err(|e| AuthError::Internal(format!("bcrypt verify: {e}")))
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_blocking(password: &str, cost: u32) -> Result<String, AuthError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| AuthError::Internal(format!("hash task: {e}")))?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(password: &str, hash: &str) -> Result<bool, AuthError> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AuthError::Internal(format!("verify task: {e}")))?
}

/// Reject passwords that are too short.
pub fn validate_password_strength(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimum cost accepted by bcrypt keeps the tests fast.
    const TEST_COST: u32 = 4;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("correct horse", TEST_COST).unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[tokio::test]
    async fn blocking_variants_agree() {
        let hash = hash_password_blocking("s3cret-pass", TEST_COST).await.unwrap();
        assert!(verify_password_blocking("s3cret-pass", &hash).await.unwrap());
    }

    #[test]
    fn garbage_hash_is_an_internal_error() {
        assert!(matches!(
            verify_password("x", "not-a-bcrypt-hash"),
            Err(AuthError::Internal(_))
        ));
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(validate_password_strength("short").is_err());
        assert!(validate_password_strength("long enough").is_ok());
    }
}
