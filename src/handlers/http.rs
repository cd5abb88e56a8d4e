//! Shared application state and the health check.

use std::sync::Arc;

use axum::{http::StatusCode, Json};
use serde_json::json;

use crate::auth::{CookiePolicy, SessionService, TokenIssuer};
use crate::config::Config;
use crate::db::UserStore;

/// Shared application state for all routes.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionService,
    pub cookies: CookiePolicy,
}

impl AppState {
    pub fn new(store: Arc<dyn UserStore>, tokens: TokenIssuer, cookies: CookiePolicy) -> Self {
        Self {
            sessions: SessionService::new(store, tokens),
            cookies,
        }
    }

    /// Build state from configuration over the given store.
    pub fn from_config(config: &Config, store: Arc<dyn UserStore>) -> Self {
        let tokens = TokenIssuer::new(
            &config.access_token_secret,
            &config.refresh_token_secret,
            config.access_token_ttl,
            config.refresh_token_ttl,
        );
        let cookies = CookiePolicy::new(config.environment.is_production(), config.cookie_same_site);
        Self::new(store, tokens, cookies)
    }

    pub fn sessions(&self) -> &SessionService {
        &self.sessions
    }
    pub fn tokens(&self) -> &TokenIssuer {
        self.sessions.tokens()
    }
    pub fn cookies(&self) -> &CookiePolicy {
        &self.cookies
    }
}

/// GET /api/v1/healthcheck — liveness probe.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "service": "vidshare" })),
    )
}
