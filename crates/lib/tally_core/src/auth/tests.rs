//! Flow tests for `AuthService` over the in-memory store.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::{Duration, Utc};

use super::action_token;
use super::jwt::TokenService;
use super::service::{AuthService, AuthSettings, Verification};
use super::{AuthError, TokenError};
use crate::config::SecurityPolicyProvider;
use crate::models::auth::{ActionTokenKind, ActionTokenPayload, ProfileUpdate, Role};
use crate::models::config::{LOCKOUT_DURATION_MS_KEY, LockoutSettings, SecurityDefaults};
use crate::store::CredentialStore;
use crate::store::memory::MemoryStore;

const PASSWORD: &str = "correct-horse";

fn service_with(store: Arc<MemoryStore>, defaults: SecurityDefaults) -> AuthService {
    let policy = Arc::new(SecurityPolicyProvider::new(store.clone(), defaults));
    AuthService::new(
        store,
        policy,
        TokenService::new(b"test-secret", 3600),
        AuthSettings {
            bcrypt_cost: 4,
            ..AuthSettings::default()
        },
    )
}

fn service(store: Arc<MemoryStore>) -> AuthService {
    service_with(store, SecurityDefaults::default())
}

async fn registered(svc: &AuthService, email: &str) -> i64 {
    svc.register("Test User", email, PASSWORD).await.unwrap()
}

#[tokio::test]
async fn register_then_login_issues_verifiable_token() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(store.clone());
    let id = registered(&svc, "a@example.test").await;

    let session = svc.login("a@example.test", PASSWORD).await.unwrap();
    assert_eq!(session.user.id, id);
    assert_eq!(session.user.role, Role::User);
    assert!(!session.user.email_verified);

    let claims = svc.tokens().verify(&session.token).unwrap();
    assert_eq!(claims.user_id, id);
    assert!(store.find_by_id(id).await.unwrap().unwrap().last_login.is_some());
}

#[tokio::test]
async fn register_rejects_duplicates_and_weak_input() {
    let svc = service(Arc::new(MemoryStore::new()));
    registered(&svc, "a@example.test").await;

    assert!(matches!(
        svc.register("Other", "A@Example.test", PASSWORD).await,
        Err(AuthError::Validation(_))
    ));
    assert!(matches!(
        svc.register("Other", "b@example.test", "short").await,
        Err(AuthError::Validation(_))
    ));
    assert!(matches!(
        svc.register("", "c@example.test", PASSWORD).await,
        Err(AuthError::Validation(_))
    ));
    assert!(matches!(
        svc.register("Other", "not-an-email", PASSWORD).await,
        Err(AuthError::Validation(_))
    ));
}

#[tokio::test]
async fn unknown_email_is_invalid_credentials() {
    let svc = service(Arc::new(MemoryStore::new()));
    assert!(matches!(
        svc.login("ghost@nowhere.test", PASSWORD).await,
        Err(AuthError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn lockout_threshold_reports_locked_only_after_n_failures() {
    let store = Arc::new(MemoryStore::new());
    let svc = service_with(
        store.clone(),
        SecurityDefaults {
            lockout: LockoutSettings {
                max_attempts: 3,
                lockout_duration_ms: 60_000,
            },
            ..SecurityDefaults::default()
        },
    );
    let id = registered(&svc, "a@example.test").await;

    for attempt in 1..=3 {
        let err = svc.login("a@example.test", "wrong-password").await.unwrap_err();
        assert!(
            matches!(err, AuthError::InvalidCredentials),
            "attempt {attempt}: {err:?}"
        );
    }

    let user = store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.failed_login_attempts, 3);
    assert!(user.account_locked_until.unwrap() > Utc::now());

    // Correct password no longer helps.
    assert!(matches!(
        svc.login("a@example.test", PASSWORD).await,
        Err(AuthError::AccountLocked)
    ));
}

#[tokio::test]
async fn fifth_failure_locks_and_sixth_is_rejected_even_with_correct_password() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(store.clone());
    let id = registered(&svc, "u1@example.test").await;
    store.update_lockout_state(id, 4, None, false).await.unwrap();

    let before = Utc::now();
    assert!(matches!(
        svc.login("u1@example.test", "nope-nope").await,
        Err(AuthError::InvalidCredentials)
    ));
    let user = store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.failed_login_attempts, 5);
    let until = user.account_locked_until.unwrap();
    let window = LockoutSettings::default().lockout_duration_ms;
    assert!(until >= before + Duration::milliseconds(window));
    assert!(until <= Utc::now() + Duration::milliseconds(window));

    assert!(matches!(
        svc.login("u1@example.test", PASSWORD).await,
        Err(AuthError::AccountLocked)
    ));
}

#[tokio::test]
async fn success_resets_counter_and_expired_lock() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(store.clone());
    let id = registered(&svc, "a@example.test").await;
    store
        .update_lockout_state(id, 9, Some(Utc::now() - Duration::seconds(1)), false)
        .await
        .unwrap();

    let session = svc.login("a@example.test", PASSWORD).await.unwrap();
    assert_eq!(session.user.failed_login_attempts, 0);

    let user = store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.failed_login_attempts, 0);
    assert_eq!(user.account_locked_until, None);
}

#[tokio::test]
async fn lockout_write_failure_still_reports_invalid_credentials() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(store.clone());
    registered(&svc, "a@example.test").await;
    store.fail.lockout_writes.store(true, Ordering::SeqCst);

    assert!(matches!(
        svc.login("a@example.test", "wrong-password").await,
        Err(AuthError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn lockout_read_failure_fails_the_request() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(store.clone());
    registered(&svc, "a@example.test").await;
    store.fail.user_reads.store(true, Ordering::SeqCst);

    assert!(matches!(
        svc.login("a@example.test", PASSWORD).await,
        Err(AuthError::Internal(_))
    ));
}

#[tokio::test]
async fn verification_gate_applies_after_success_is_recorded() {
    let store = Arc::new(MemoryStore::new());
    let svc = service_with(
        store.clone(),
        SecurityDefaults {
            require_email_verification: true,
            ..SecurityDefaults::default()
        },
    );
    let id = registered(&svc, "a@example.test").await;
    store.update_lockout_state(id, 2, None, false).await.unwrap();

    assert!(matches!(
        svc.login("a@example.test", PASSWORD).await,
        Err(AuthError::EmailVerificationRequired)
    ));
    assert_eq!(
        store.find_by_id(id).await.unwrap().unwrap().failed_login_attempts,
        0
    );

    let token = svc
        .request_email_verification("a@example.test")
        .await
        .token
        .unwrap();
    assert_eq!(svc.verify_email(&token).await.unwrap(), Verification::Verified);
    assert_eq!(
        svc.verify_email(&token).await.unwrap(),
        Verification::AlreadyVerified
    );
    assert!(svc.login("a@example.test", PASSWORD).await.is_ok());
}

#[tokio::test]
async fn password_reset_round_trip_clears_lock() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(store.clone());
    let id = registered(&svc, "a@example.test").await;
    store
        .update_lockout_state(id, 5, Some(Utc::now() + Duration::hours(1)), false)
        .await
        .unwrap();

    let token = svc
        .request_password_reset("a@example.test")
        .await
        .token
        .unwrap();
    svc.reset_password(&token, "brand-new-pass").await.unwrap();

    let user = store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.failed_login_attempts, 0);
    assert_eq!(user.account_locked_until, None);
    assert!(svc.login("a@example.test", "brand-new-pass").await.is_ok());
    assert!(matches!(
        svc.login("a@example.test", PASSWORD).await,
        Err(AuthError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn reset_request_for_unknown_email_has_no_token() {
    let svc = service(Arc::new(MemoryStore::new()));
    assert!(svc.request_password_reset("ghost@nowhere.test").await.token.is_none());
}

#[tokio::test]
async fn reset_rejects_expired_wrong_type_and_mismatched_tokens() {
    let svc = service(Arc::new(MemoryStore::new()));
    let id = registered(&svc, "a@example.test").await;
    let now = Utc::now();

    let expired = action_token::encode(&ActionTokenPayload {
        email: "a@example.test".into(),
        user_id: id,
        kind: "password_reset".into(),
        iat: now.timestamp_millis() - 10_000,
        exp: now.timestamp_millis() - 1,
    })
    .unwrap();
    match svc.reset_password(&expired, "brand-new-pass").await {
        Err(AuthError::Validation(msg)) => assert_eq!(msg, TokenError::Expired.to_string()),
        other => panic!("unexpected {other:?}"),
    }

    let verification = action_token::encode(&action_token::new_payload(
        ActionTokenKind::EmailVerification,
        "a@example.test",
        id,
        Duration::hours(1),
        now,
    ))
    .unwrap();
    assert!(matches!(
        svc.reset_password(&verification, "brand-new-pass").await,
        Err(AuthError::Validation(_))
    ));

    let mismatched = action_token::encode(&action_token::new_payload(
        ActionTokenKind::PasswordReset,
        "a@example.test",
        id + 100,
        Duration::hours(1),
        now,
    ))
    .unwrap();
    assert!(matches!(
        svc.reset_password(&mismatched, "brand-new-pass").await,
        Err(AuthError::NotFound(_))
    ));

    assert!(matches!(
        svc.reset_password("garbage", "brand-new-pass").await,
        Err(AuthError::Validation(_))
    ));
}

#[tokio::test]
async fn refresh_accepts_expired_token_for_live_account() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(store.clone());
    let id = registered(&svc, "a@example.test").await;
    let user = store.find_by_id(id).await.unwrap().unwrap();

    let stale = svc
        .tokens()
        .issue_at(&user, Utc::now() - Duration::days(3))
        .unwrap();
    assert_eq!(svc.tokens().verify(&stale), Err(TokenError::Expired));

    let session = svc.refresh_token(&stale).await.unwrap();
    assert_eq!(svc.tokens().verify(&session.token).unwrap().user_id, id);
}

#[tokio::test]
async fn refresh_fails_for_locked_or_deleted_account() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(store.clone());
    let id = registered(&svc, "a@example.test").await;
    let user = store.find_by_id(id).await.unwrap().unwrap();
    let token = svc.tokens().issue(&user).unwrap();

    store
        .update_lockout_state(id, 5, Some(Utc::now() + Duration::hours(1)), false)
        .await
        .unwrap();
    assert!(matches!(
        svc.refresh_token(&token).await,
        Err(AuthError::AccountLocked)
    ));

    assert!(store.delete_user(id).await.unwrap());
    assert!(matches!(
        svc.refresh_token(&token).await,
        Err(AuthError::Unauthenticated(_))
    ));

    assert!(matches!(
        svc.refresh_token("not-a-token").await,
        Err(AuthError::Unauthenticated(_))
    ));
}

#[tokio::test]
async fn change_password_requires_current_password() {
    let svc = service(Arc::new(MemoryStore::new()));
    let id = registered(&svc, "a@example.test").await;

    assert!(matches!(
        svc.change_password(id, "wrong-current", "another-pass").await,
        Err(AuthError::Unauthenticated(_))
    ));
    svc.change_password(id, PASSWORD, "another-pass").await.unwrap();
    assert!(svc.login("a@example.test", "another-pass").await.is_ok());
}

#[tokio::test]
async fn profile_update_validates_and_detects_conflicts() {
    let svc = service(Arc::new(MemoryStore::new()));
    let a = registered(&svc, "a@example.test").await;
    registered(&svc, "b@example.test").await;

    let updated = svc
        .update_profile(
            a,
            ProfileUpdate {
                name: Some("  Ada  ".into()),
                ..ProfileUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name.as_deref(), Some("Ada"));
    assert_eq!(updated.email, "a@example.test");

    assert!(matches!(
        svc.update_profile(
            a,
            ProfileUpdate {
                email: Some("B@example.test".into()),
                ..ProfileUpdate::default()
            }
        )
        .await,
        Err(AuthError::Validation(_))
    ));
    assert!(matches!(
        svc.update_profile(a, ProfileUpdate::default()).await,
        Err(AuthError::Validation(_))
    ));
}

#[tokio::test]
async fn delete_user_is_admin_only_and_keeps_last_admin() {
    let svc = service(Arc::new(MemoryStore::new()));
    let admin_id = svc
        .bootstrap_admin("Root", "root@example.test", PASSWORD)
        .await
        .unwrap();
    let user_id = registered(&svc, "a@example.test").await;
    let admin = svc.profile(admin_id).await.unwrap();
    let user = svc.profile(user_id).await.unwrap();

    assert!(matches!(
        svc.delete_user(&user, admin_id).await,
        Err(AuthError::Forbidden(_))
    ));
    assert!(matches!(
        svc.delete_user(&admin, admin_id).await,
        Err(AuthError::Forbidden(_))
    ));
    svc.delete_user(&admin, user_id).await.unwrap();
    assert!(matches!(
        svc.delete_user(&admin, user_id).await,
        Err(AuthError::NotFound(_))
    ));
}

#[tokio::test]
async fn unlock_clears_lockout_fields() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(store.clone());
    let id = registered(&svc, "a@example.test").await;
    store
        .update_lockout_state(id, 7, Some(Utc::now() + Duration::hours(1)), false)
        .await
        .unwrap();

    let user = svc.unlock("a@example.test").await.unwrap();
    assert_eq!(user.failed_login_attempts, 0);
    assert!(user.account_locked_until.is_none());
}

#[tokio::test]
async fn oversized_lockout_override_still_locks_with_default_window() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(store.clone());
    svc.policy()
        .set_override(LOCKOUT_DURATION_MS_KEY, "9000000000000000000")
        .await
        .unwrap();
    let id = registered(&svc, "a@example.test").await;

    let before = Utc::now();
    for _ in 0..5 {
        assert!(matches!(
            svc.login("a@example.test", "wrong-password").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    let user = store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.failed_login_attempts, 5);
    let until = user.account_locked_until.unwrap();
    let window = LockoutSettings::default().lockout_duration_ms;
    assert!(until >= before + Duration::milliseconds(window));
    assert!(until <= Utc::now() + Duration::milliseconds(window));
    assert!(matches!(
        svc.login("a@example.test", PASSWORD).await,
        Err(AuthError::AccountLocked)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_failures_are_each_counted() {
    let store = Arc::new(MemoryStore::new());
    let svc = Arc::new(service(store.clone()));
    let id = registered(&svc, "a@example.test").await;

    let attempts = (0..10).map(|_| {
        let svc = svc.clone();
        tokio::spawn(async move { svc.login("a@example.test", "wrong-password").await })
    });
    for result in futures::future::join_all(attempts).await {
        assert!(matches!(result.unwrap(), Err(AuthError::InvalidCredentials)));
    }

    let user = store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.failed_login_attempts, 10);
    assert!(user.account_locked_until.unwrap() > Utc::now());
    assert!(matches!(
        svc.login("a@example.test", PASSWORD).await,
        Err(AuthError::AccountLocked)
    ));
}
