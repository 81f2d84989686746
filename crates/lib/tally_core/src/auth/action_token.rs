//! Password-reset and email-verification tokens.
//!
//! Wire format: standard base64 of the JSON payload. The encoding is
//! reversible and unsigned; redemption must re-check the embedded user id and
//! email against the current user record before acting on it.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration, Utc};

use super::TokenError;
use crate::models::auth::{ActionTokenKind, ActionTokenPayload};

/// Default password-reset window: 1 hour.
pub const DEFAULT_RESET_WINDOW_SECS: i64 = 60 * 60;

/// Default email-verification window: 24 hours.
pub const DEFAULT_VERIFICATION_WINDOW_SECS: i64 = 24 * 60 * 60;

/// Build a payload bound to `(email, user_id)` that expires after `window`.
pub fn new_payload(
    kind: ActionTokenKind,
    email: &str,
    user_id: i64,
    window: Duration,
    now: DateTime<Utc>,
) -> ActionTokenPayload {
    ActionTokenPayload {
        email: email.to_string(),
        user_id,
        kind: kind.as_str().to_string(),
        iat: now.timestamp_millis(),
        exp: (now + window).timestamp_millis(),
    }
}

/// Encode a payload to its string form.
pub fn encode(payload: &ActionTokenPayload) -> Result<String, TokenError> {
    let json = serde_json::to_vec(payload).map_err(|e| TokenError::Encode(e.to_string()))?;
    Ok(STANDARD.encode(json))
}

/// Decode a token string back into its payload.
pub fn decode(token: &str) -> Result<ActionTokenPayload, TokenError> {
    let bytes = STANDARD
        .decode(token.trim())
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

/// Decode and check expiry, then type.
pub fn validate(
    token: &str,
    expected: ActionTokenKind,
    now: DateTime<Utc>,
) -> Result<ActionTokenPayload, TokenError> {
    let payload = decode(token)?;
    if now.timestamp_millis() > payload.exp {
        return Err(TokenError::Expired);
    }
    if payload.kind != expected.as_str() {
        return Err(TokenError::WrongType);
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(kind: &str, exp: i64) -> ActionTokenPayload {
        ActionTokenPayload {
            email: "ünïcode+tag@example.test".into(),
            user_id: 42,
            kind: kind.into(),
            iat: 1_700_000_000_000,
            exp,
        }
    }

    #[test]
    fn decode_inverts_encode() {
        for p in [
            payload("password_reset", i64::MAX),
            payload("email_verification", 0),
            payload("", -1),
        ] {
            assert_eq!(decode(&encode(&p).unwrap()).unwrap(), p);
        }
    }

    #[test]
    fn wire_format_is_base64_json() {
        let token = encode(&payload("password_reset", 5)).unwrap();
        let raw: serde_json::Value =
            serde_json::from_slice(&STANDARD.decode(&token).unwrap()).unwrap();
        assert_eq!(raw["userId"], 42);
        assert_eq!(raw["type"], "password_reset");
        assert_eq!(raw["exp"], 5);
    }

    #[test]
    fn validate_accepts_fresh_token_of_expected_kind() {
        let now = Utc::now();
        let p = new_payload(
            ActionTokenKind::PasswordReset,
            "a@example.test",
            1,
            Duration::hours(1),
            now,
        );
        let token = encode(&p).unwrap();
        assert_eq!(validate(&token, ActionTokenKind::PasswordReset, now).unwrap(), p);
    }

    #[test]
    fn validate_rejects_expired_before_type() {
        let now = Utc::now();
        let token = encode(&payload("email_verification", now.timestamp_millis() - 1)).unwrap();
        assert_eq!(
            validate(&token, ActionTokenKind::PasswordReset, now),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn validate_rejects_wrong_kind() {
        let now = Utc::now();
        let token = encode(&payload("email_verification", i64::MAX)).unwrap();
        assert_eq!(
            validate(&token, ActionTokenKind::PasswordReset, now),
            Err(TokenError::WrongType)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let now = Utc::now();
        assert_eq!(decode("%%%"), Err(TokenError::Malformed));
        let not_json = STANDARD.encode(b"hello");
        assert_eq!(
            validate(&not_json, ActionTokenKind::EmailVerification, now),
            Err(TokenError::Malformed)
        );
    }
}
