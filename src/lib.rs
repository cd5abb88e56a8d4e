//! Account and session service for a video-sharing platform.
//!
//! Issues short-lived access tokens and rotating refresh tokens, verifies
//! passwords with argon2, and keeps one revocable session per user.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use handlers::http::AppState;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post};
use handlers::http;

/// JSON request bodies are capped at 16 KiB.
pub const BODY_LIMIT_BYTES: usize = 16 * 1024;

/// Build the API router. Used by main and by integration tests.
pub fn create_app(state: AppState) -> axum::Router {
    let user_routes = axum::Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/refresh-token", post(auth::refresh_token))
        .route("/change-password", post(auth::change_password))
        .route("/current-user", get(auth::current_user).post(auth::current_user))
        .route("/update-account", patch(auth::update_account))
        .route("/avatar", patch(auth::update_avatar))
        .route("/cover-image", patch(auth::update_cover_image));

    axum::Router::new()
        .route("/api/v1/healthcheck", get(http::health))
        .nest("/api/v1/users", user_routes)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .with_state(state)
}
