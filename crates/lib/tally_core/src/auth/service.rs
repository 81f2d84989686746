//! Authentication service covering login, registration, renewal, password reset,
//! email verification and profile changes.
//!
//! Every collaborator is injected at construction; nothing here is global.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, error, info, warn};

use super::action_token::{self, DEFAULT_RESET_WINDOW_SECS, DEFAULT_VERIFICATION_WINDOW_SECS};
use super::jwt::TokenService;
use super::lockout::LockoutPolicy;
use super::password::{
    DEFAULT_BCRYPT_COST, hash_password_blocking, validate_password_strength,
    verify_password_blocking,
};
use super::{AuthError, TokenError};
use crate::config::SecurityPolicyProvider;
use crate::models::auth::{
    ACCESS_TOKEN_TYPE, ActionTokenKind, ActionTokenPayload, NewUser, ProfileUpdate, PublicUser,
    Role,
};
use crate::store::CredentialStore;

/// Response message for password-reset requests, identical whether or not
/// the account exists.
pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account with that email exists, a password reset link has been sent.";

/// Response message for verification requests, identical whether or not the
/// account exists.
pub const VERIFICATION_REQUESTED_MESSAGE: &str =
    "If an account with that email exists and is unverified, a verification link has been sent.";

/// Tunables that are not part of the persisted security policy.
#[derive(Debug, Clone, Copy)]
pub struct AuthSettings {
    pub bcrypt_cost: u32,
    pub reset_window_secs: i64,
    pub verification_window_secs: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            reset_window_secs: DEFAULT_RESET_WINDOW_SECS,
            verification_window_secs: DEFAULT_VERIFICATION_WINDOW_SECS,
        }
    }
}

/// A freshly issued session.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: PublicUser,
    pub token: String,
}

/// Result of a reset or verification request. `token` is `None` when no
/// eligible account exists; callers must not let that difference leak.
#[derive(Debug, Clone, Default)]
pub struct ActionRequest {
    pub token: Option<String>,
}

/// Outcome of redeeming a verification token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Verified,
    AlreadyVerified,
}

/// Orchestrates the auth flows over the injected store, policy and tokens.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    policy: Arc<SecurityPolicyProvider>,
    lockout: LockoutPolicy,
    tokens: TokenService,
    settings: AuthSettings,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        policy: Arc<SecurityPolicyProvider>,
        tokens: TokenService,
        settings: AuthSettings,
    ) -> Self {
        let lockout = LockoutPolicy::new(store.clone(), policy.clone());
        Self {
            store,
            policy,
            lockout,
            tokens,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn policy(&self) -> &Arc<SecurityPolicyProvider> {
        &self.policy
    }

    pub fn lockout(&self) -> &LockoutPolicy {
        &self.lockout
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    // -----------------------------------------------------------------------
    // Login & registration
    // -----------------------------------------------------------------------

    /// Authenticate with email + password.
    ///
    /// The failed attempt that reaches the lockout threshold still reports
    /// invalid credentials; the lock is surfaced from the next attempt on.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Email and password are required".into(),
            ));
        }

        let user = self
            .store
            .find_for_authentication(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if self.lockout.is_locked(&user.profile) {
            info!(user_id = user.id(), "login rejected: account locked");
            return Err(AuthError::AccountLocked);
        }

        let Some(hash) = user.password_hash.as_deref() else {
            debug!(user_id = user.id(), "login rejected: no password set");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password_blocking(password, hash).await? {
            match self.lockout.record_failure(&user.profile).await {
                Ok(Some(state)) => info!(
                    user_id = user.id(),
                    attempts = state.failed_attempts,
                    "login rejected: bad password"
                ),
                Ok(None) => debug!(
                    user_id = user.id(),
                    "login rejected: user removed during attempt"
                ),
                Err(e) => error!(
                    user_id = user.id(),
                    error = %e,
                    "failed to persist failed login attempt"
                ),
            }
            return Err(AuthError::InvalidCredentials);
        }

        self.lockout.record_success(&user.profile).await?;

        let mut profile = PublicUser::from(user);
        profile.failed_login_attempts = 0;
        profile.account_locked_until = None;
        profile.last_login = Some(Utc::now());

        if !profile.email_verified && self.policy.is_email_verification_required().await {
            info!(user_id = profile.id, "login rejected: email not verified");
            return Err(AuthError::EmailVerificationRequired);
        }

        let token = self.issue(&profile)?;
        info!(user_id = profile.id, "user logged in");
        Ok(Session {
            user: profile,
            token,
        })
    }

    /// Register a new account with role `user`. Returns the new id.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<i64, AuthError> {
        let name = name.trim();
        let email = normalize_email(email);
        if name.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Name, email and password are required".into(),
            ));
        }
        validate_email(&email)?;
        validate_password_strength(password)?;

        let password_hash = hash_password_blocking(password, self.settings.bcrypt_cost).await?;
        let id = self
            .store
            .create(NewUser {
                name: Some(name.to_string()),
                username: email.clone(),
                email,
                password_hash: Some(password_hash),
                role: Role::User,
                email_verified: false,
            })
            .await?;

        info!(user_id = id, "user registered");
        Ok(id)
    }

    /// Create a verified admin account. Operator tooling only.
    pub async fn bootstrap_admin(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<i64, AuthError> {
        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password_strength(password)?;

        let password_hash = hash_password_blocking(password, self.settings.bcrypt_cost).await?;
        let id = self
            .store
            .create(NewUser {
                name: Some(name.trim().to_string()).filter(|n| !n.is_empty()),
                username: email.clone(),
                email,
                password_hash: Some(password_hash),
                role: Role::Admin,
                email_verified: true,
            })
            .await?;

        warn!(user_id = id, "admin account created");
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Session renewal
    // -----------------------------------------------------------------------

    /// Issue a new session from an old token, which may be expired or signed
    /// with a rotated secret. Renewal is granted on the account's current
    /// state: it must still exist and must not be locked.
    pub async fn refresh_token(&self, old_token: &str) -> Result<Session, AuthError> {
        let claims = self
            .tokens
            .decode_unverified(old_token)
            .map_err(|_| AuthError::Unauthenticated("Invalid token".into()))?;
        if claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(AuthError::Unauthenticated("Invalid token".into()));
        }

        let user = self
            .store
            .find_by_id(claims.user_id)
            .await?
            .ok_or_else(|| AuthError::Unauthenticated("User not found".into()))?;

        if self.lockout.is_locked(&user) {
            info!(user_id = user.id, "token refresh rejected: account locked");
            return Err(AuthError::AccountLocked);
        }

        let token = self.issue(&user)?;
        debug!(user_id = user.id, "session renewed");
        Ok(Session { user, token })
    }

    // -----------------------------------------------------------------------
    // Password reset
    // -----------------------------------------------------------------------

    /// Mint a reset token when the account exists. Never fails: lookup
    /// errors are logged and treated like an unknown address.
    pub async fn request_password_reset(&self, email: &str) -> ActionRequest {
        let email = normalize_email(email);
        let user = match self.store.find_by_email(&email).await {
            Ok(user) => user,
            Err(e) => {
                error!(error = %e, "password reset lookup failed");
                None
            }
        };

        let Some(user) = user else {
            debug!("password reset requested for unknown address");
            return ActionRequest::default();
        };

        let window = Duration::seconds(self.settings.reset_window_secs);
        let token = self.mint_action_token(ActionTokenKind::PasswordReset, &user, window);
        info!(user_id = user.id, "password reset requested");
        ActionRequest { token }
    }

    /// Redeem a reset token: set the new password and clear any lockout.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        if token.trim().is_empty() || new_password.is_empty() {
            return Err(AuthError::Validation(
                "Token and password are required".into(),
            ));
        }
        let payload = action_token::validate(token, ActionTokenKind::PasswordReset, Utc::now())
            .map_err(token_rejected)?;
        validate_password_strength(new_password)?;

        let user = self.resolve_token_user(&payload).await?;
        let hash = hash_password_blocking(new_password, self.settings.bcrypt_cost).await?;
        self.store.update_password(user.id, &hash).await?;
        self.lockout.release(&user).await?;

        info!(user_id = user.id, "password reset completed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Email verification
    // -----------------------------------------------------------------------

    /// Mint a verification token when the account exists and is unverified.
    pub async fn request_email_verification(&self, email: &str) -> ActionRequest {
        let email = normalize_email(email);
        let user = match self.store.find_by_email(&email).await {
            Ok(user) => user,
            Err(e) => {
                error!(error = %e, "verification lookup failed");
                None
            }
        };

        match user {
            Some(user) if !user.email_verified => {
                let window = Duration::seconds(self.settings.verification_window_secs);
                let token =
                    self.mint_action_token(ActionTokenKind::EmailVerification, &user, window);
                info!(user_id = user.id, "email verification requested");
                ActionRequest { token }
            }
            _ => ActionRequest::default(),
        }
    }

    /// Redeem a verification token. Idempotent for already-verified accounts.
    pub async fn verify_email(&self, token: &str) -> Result<Verification, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::Validation("Token is required".into()));
        }
        let payload =
            action_token::validate(token, ActionTokenKind::EmailVerification, Utc::now())
                .map_err(token_rejected)?;

        let user = self.resolve_token_user(&payload).await?;
        if user.email_verified {
            return Ok(Verification::AlreadyVerified);
        }

        self.store.mark_email_verified(user.id).await?;
        info!(user_id = user.id, "email verified");
        Ok(Verification::Verified)
    }

    // -----------------------------------------------------------------------
    // Profile
    // -----------------------------------------------------------------------

    pub async fn profile(&self, user_id: i64) -> Result<PublicUser, AuthError> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".into()))
    }

    /// Update name, username and/or email, returning the stored result.
    pub async fn update_profile(
        &self,
        user_id: i64,
        update: ProfileUpdate,
    ) -> Result<PublicUser, AuthError> {
        let update = clean_profile_update(update)?;
        self.profile(user_id).await?;
        self.store.update_profile(user_id, &update).await?;
        info!(user_id, "profile updated");
        self.profile(user_id).await
    }

    /// Re-verify the current password before replacing it.
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if current_password.is_empty() || new_password.is_empty() {
            return Err(AuthError::Validation(
                "Current and new password are required".into(),
            ));
        }
        validate_password_strength(new_password)?;

        let profile = self.profile(user_id).await?;
        let user = self
            .store
            .find_for_authentication(&profile.email)
            .await?
            .filter(|u| u.id() == user_id)
            .ok_or_else(|| AuthError::NotFound("User not found".into()))?;

        let current_ok = match user.password_hash.as_deref() {
            Some(hash) => verify_password_blocking(current_password, hash).await?,
            None => false,
        };
        if !current_ok {
            info!(user_id, "password change rejected: wrong current password");
            return Err(AuthError::Unauthenticated(
                "Current password is incorrect".into(),
            ));
        }

        let hash = hash_password_blocking(new_password, self.settings.bcrypt_cost).await?;
        self.store.update_password(user_id, &hash).await?;
        info!(user_id, "password changed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------------

    /// Delete an account on behalf of `actor`, who must be an admin.
    pub async fn delete_user(&self, actor: &PublicUser, target_id: i64) -> Result<(), AuthError> {
        if actor.role != Role::Admin {
            return Err(AuthError::Forbidden("Admin role required".into()));
        }
        if !self.store.delete_user(target_id).await? {
            return Err(AuthError::NotFound("User not found".into()));
        }
        warn!(actor_id = actor.id, target_id, "user deleted");
        Ok(())
    }

    /// Clear the lockout state of the account registered under `email`.
    pub async fn unlock(&self, email: &str) -> Result<PublicUser, AuthError> {
        let user = self
            .store
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".into()))?;
        self.lockout.release(&user).await?;
        self.profile(user.id).await
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn issue(&self, user: &PublicUser) -> Result<String, AuthError> {
        self.tokens
            .issue(user)
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    fn mint_action_token(
        &self,
        kind: ActionTokenKind,
        user: &PublicUser,
        window: Duration,
    ) -> Option<String> {
        let payload = action_token::new_payload(kind, &user.email, user.id, window, Utc::now());
        match action_token::encode(&payload) {
            Ok(token) => Some(token),
            Err(e) => {
                error!(user_id = user.id, error = %e, "failed to encode action token");
                None
            }
        }
    }

    /// The embedded email and id must still name the same account.
    async fn resolve_token_user(
        &self,
        payload: &ActionTokenPayload,
    ) -> Result<PublicUser, AuthError> {
        self.store
            .find_by_email(&payload.email)
            .await?
            .filter(|u| u.id == payload.user_id)
            .ok_or_else(|| AuthError::NotFound("User not found".into()))
    }
}

fn token_rejected(e: TokenError) -> AuthError {
    AuthError::Validation(e.to_string())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if valid {
        Ok(())
    } else {
        Err(AuthError::Validation("Invalid email address".into()))
    }
}

fn clean_profile_update(update: ProfileUpdate) -> Result<ProfileUpdate, AuthError> {
    if update.is_empty() {
        return Err(AuthError::Validation("No profile fields provided".into()));
    }

    let non_empty = |field: &str, v: Option<String>| -> Result<Option<String>, AuthError> {
        match v.map(|s| s.trim().to_string()) {
            Some(s) if s.is_empty() => {
                Err(AuthError::Validation(format!("{field} must not be empty")))
            }
            other => Ok(other),
        }
    };

    let email = non_empty("email", update.email)?.map(|e| e.to_lowercase());
    if let Some(email) = &email {
        validate_email(email)?;
    }
    Ok(ProfileUpdate {
        name: non_empty("name", update.name)?,
        username: non_empty("username", update.username)?,
        email,
    })
}
