//! User administration.

use axum::extract::{Path, State};
use axum::{Extension, Json};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::MessageResponse;

/// `DELETE /users/{id}`: admin only.
pub async fn delete_user_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(actor)): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    state.auth.delete_user(&actor, id).await?;
    Ok(Json(MessageResponse::new("User deleted successfully")))
}
