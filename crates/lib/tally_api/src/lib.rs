//! # tally_api
//!
//! HTTP API library for Tally.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use sqlx::PgPool;
use tally_core::auth::service::AuthService;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ApiConfig;
use crate::handlers::{auth, health, profile, users};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Authentication service over the configured store.
    pub auth: Arc<AuthService>,
    /// API configuration.
    pub config: ApiConfig,
}

/// Run embedded database migrations.
///
/// Delegates to `tally_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    tally_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::GET_HEALTH, get(health::health_handler))
        .route(routes::POST_LOGIN, post(auth::login_handler))
        .route(routes::POST_REGISTER, post(auth::register_handler))
        .route(routes::POST_FORGOT_PASSWORD, post(auth::forgot_password_handler))
        .route(routes::POST_RESET_PASSWORD, post(auth::reset_password_handler))
        .route(routes::POST_VERIFY_EMAIL, post(auth::verify_email_handler))
        .route(
            routes::POST_RESEND_VERIFICATION,
            post(auth::resend_verification_handler),
        )
        .route(routes::POST_REFRESH_TOKEN, post(auth::refresh_handler));

    // Admin routes; wrapped by require_auth once merged below
    let admin = Router::new()
        .route(routes::DELETE_USERS_ID, delete(users::delete_user_handler))
        .layer(axum::middleware::from_fn(middleware::auth::require_admin));

    // Protected routes (require auth)
    let protected = Router::new()
        .route(
            routes::PROFILE,
            get(profile::get_profile_handler).put(profile::update_profile_handler),
        )
        .route(
            routes::POST_CHANGE_PASSWORD,
            post(profile::change_password_handler),
        )
        .merge(admin)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .with_state(state)
}
