//! Session token issuance and verification (HS256 JWT).

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{info, warn};

use super::TokenError;
use crate::models::auth::{ACCESS_TOKEN_TYPE, PublicUser, SessionClaims};

/// Default access token lifetime: 24 hours.
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Longest accepted access token lifetime: ten years.
pub const MAX_ACCESS_TOKEN_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Issues and verifies signed session tokens.
///
/// Holds the process-wide signing secret; cheap to clone and read-only after
/// startup.
#[derive(Clone)]
pub struct TokenService {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenService {
    /// A lifetime outside `1..=MAX_ACCESS_TOKEN_TTL_SECS` is replaced by the
    /// default.
    pub fn new(secret: &[u8], ttl_secs: i64) -> Self {
        let ttl_secs = if (1..=MAX_ACCESS_TOKEN_TTL_SECS).contains(&ttl_secs) {
            ttl_secs
        } else {
            warn!(ttl_secs, "access token lifetime out of range, using default");
            DEFAULT_ACCESS_TOKEN_TTL_SECS
        };
        Self {
            secret: secret.to_vec(),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Access token lifetime in seconds.
    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Issue a token for `user`, valid from now.
    pub fn issue(&self, user: &PublicUser) -> Result<String, TokenError> {
        self.issue_at(user, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(&self, user: &PublicUser, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = SessionClaims {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| TokenError::Encode(format!("jwt encode: {e}")))
    }

    /// Verify signature, expiry and token type.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let key = DecodingKey::from_secret(&self.secret);
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        let claims = decode::<SessionClaims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })?;

        if claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }

    /// Decode claims while ignoring signature and expiry.
    ///
    /// Only for token renewal, which re-validates the account itself before
    /// issuing anything.
    pub fn decode_unverified(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        decode::<SessionClaims>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .map_err(|_| TokenError::Malformed)
    }
}

/// Resolve the JWT secret from `JWT_SECRET`, then `AUTH_SECRET`, then the persisted file.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("AUTH_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new JWT secret");
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tally")
        .join("jwt-secret")
}
