//! Profile handlers for the authenticated caller.

use axum::extract::State;
use axum::{Extension, Json};
use tally_core::models::auth::{ProfileUpdate, PublicUser};

use crate::AppState;
use crate::error::AppResult;
use crate::extract::ApiJson;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{ChangePasswordRequest, DataResponse, MessageResponse};

/// `GET /profile`
pub async fn get_profile_handler(
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Json<DataResponse<PublicUser>> {
    Json(DataResponse::new(user))
}

/// `PUT /profile`: update name, username and/or email.
pub async fn update_profile_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    ApiJson(body): ApiJson<ProfileUpdate>,
) -> AppResult<Json<DataResponse<PublicUser>>> {
    let updated = state.auth.update_profile(user.id, body).await?;
    Ok(Json(DataResponse::new(updated)))
}

/// `POST /change-password`
pub async fn change_password_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    ApiJson(body): ApiJson<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .auth
        .change_password(user.id, &body.current_password, &body.new_password)
        .await?;
    Ok(Json(MessageResponse::new("Password changed successfully")))
}
