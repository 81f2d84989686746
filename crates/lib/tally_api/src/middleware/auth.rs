//! Authentication middleware: bearer token, account state, role gate.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tally_core::auth::AuthError;
use tally_core::models::auth::{PublicUser, Role};
use tracing::{debug, warn};

use crate::AppState;
use crate::error::AppError;

/// The account behind a verified session, re-read from the store on every
/// request. Stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub PublicUser);

/// Axum middleware: verifies `Authorization: Bearer <token>`, reloads the
/// user, enforces lockout and email verification, and injects
/// `AuthenticatedUser` into request extensions.
///
/// Every check fails closed except the email-verification policy lookup,
/// which lets the request through when the setting cannot be read.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;

    let claims = state.auth.tokens().verify(token).map_err(|e| {
        debug!(error = %e, "session token rejected");
        AppError::Unauthorized("Invalid or expired token".into())
    })?;

    let user = state
        .auth
        .store()
        .find_by_id(claims.user_id)
        .await
        .map_err(AuthError::from)?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    if state.auth.lockout().is_locked(&user) {
        return Err(AuthError::AccountLocked.into());
    }

    if !user.email_verified {
        match state.auth.policy().try_is_email_verification_required().await {
            Ok(true) => return Err(AuthError::EmailVerificationRequired.into()),
            Ok(false) => {}
            Err(e) => warn!(
                user_id = user.id,
                error = %e,
                "email verification policy unavailable, allowing request"
            ),
        }
    }

    request.extensions_mut().insert(AuthenticatedUser(user));

    Ok(next.run(request).await)
}

/// Axum middleware: rejects callers whose role is not admin. Must run after
/// [`require_auth`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let role = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|u| u.0.role)
        .ok_or_else(|| AppError::Unauthorized("Not authenticated".into()))?;

    if role != Role::Admin {
        return Err(AppError::Forbidden("Admin role required".into()));
    }
    Ok(next.run(request).await)
}
