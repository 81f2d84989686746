//! Authentication request handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use tally_core::auth::service::{
    ActionRequest, RESET_REQUESTED_MESSAGE, Session, VERIFICATION_REQUESTED_MESSAGE, Verification,
};

use crate::AppState;
use crate::error::AppResult;
use crate::extract::ApiJson;
use crate::models::{
    CreatedData, DataResponse, EmailRequest, LoginRequest, MessageResponse, RegisterRequest,
    ResetPasswordRequest, SessionData, TokenRequest,
};

/// `POST /login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<Json<DataResponse<SessionData>>> {
    let session = state.auth.login(&body.email, &body.password).await?;
    Ok(Json(session_response(session)))
}

/// `POST /register`: create a new user account.
pub async fn register_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<CreatedData>>)> {
    let id = state
        .auth
        .register(&body.name, &body.email, &body.password)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(CreatedData { id })),
    ))
}

/// `POST /refresh-token`: renew a session from an old, possibly expired, token.
pub async fn refresh_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<TokenRequest>,
) -> AppResult<Json<DataResponse<SessionData>>> {
    let session = state.auth.refresh_token(&body.token).await?;
    Ok(Json(session_response(session)))
}

/// `POST /forgot-password`: always succeeds with the same message.
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<EmailRequest>,
) -> Json<MessageResponse> {
    let request = state.auth.request_password_reset(&body.email).await;
    Json(action_response(&state, RESET_REQUESTED_MESSAGE, request))
}

/// `POST /reset-password`: redeem a reset token.
pub async fn reset_password_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .auth
        .reset_password(&body.token, &body.password)
        .await?;
    Ok(Json(MessageResponse::new(
        "Password has been reset successfully",
    )))
}

/// `POST /verify-email`: redeem a verification token.
pub async fn verify_email_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<TokenRequest>,
) -> AppResult<Json<MessageResponse>> {
    let message = match state.auth.verify_email(&body.token).await? {
        Verification::Verified => "Email verified successfully",
        Verification::AlreadyVerified => "Email is already verified",
    };
    Ok(Json(MessageResponse::new(message)))
}

/// `POST /resend-verification`: always succeeds with the same message.
pub async fn resend_verification_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<EmailRequest>,
) -> Json<MessageResponse> {
    let request = state.auth.request_email_verification(&body.email).await;
    Json(action_response(&state, VERIFICATION_REQUESTED_MESSAGE, request))
}

fn session_response(session: Session) -> DataResponse<SessionData> {
    DataResponse::new(SessionData {
        user: session.user,
        token: session.token,
    })
}

/// The token is echoed only outside production, where no mailer exists.
fn action_response(state: &AppState, message: &str, request: ActionRequest) -> MessageResponse {
    let mut response = MessageResponse::new(message);
    if !state.config.is_production() {
        response.token = request.token;
    }
    response
}
