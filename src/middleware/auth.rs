//! Access-token extractor for routes that require a logged-in user.

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    extract::cookie::CookieJar,
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tracing::debug;
use uuid::Uuid;

use crate::auth::ACCESS_COOKIE;
use crate::error::AppError;
use crate::handlers::http::AppState;

/// Extractor: authenticated user ID from the access token.
///
/// Reads `Authorization: Bearer <token>` first, then the `accessToken` cookie.
#[derive(Clone, Copy, Debug)]
pub struct AuthUser(pub Uuid);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = match TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await {
            Ok(TypedHeader(Authorization(bearer))) => Some(bearer.token().to_string()),
            Err(_) => CookieJar::from_headers(&parts.headers)
                .get(ACCESS_COOKIE)
                .map(|c| c.value().to_string()),
        };
        let token = token.ok_or_else(|| {
            debug!("rejected request: no access token");
            AppError::Unauthorized("Unauthorized request".to_string())
        })?;
        let user_id = state.tokens().verify_access_token(&token)?;
        Ok(AuthUser(user_id))
    }
}
