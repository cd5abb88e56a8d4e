//! Account HTTP handlers: register, login, logout, refresh, password and profile.

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::cookies::REFRESH_COOKIE;
use crate::auth::service::{LoginIdentifier, Registration};
use crate::error::{AppError, AppResult};
use crate::handlers::http::AppState;
use crate::middleware::{AppJson, AuthUser};
use crate::models::{SanitizedUser, TokenPair, UserChanges};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 255, message = "fullname is required"))]
    pub fullname: String,
    #[validate(email(message = "a valid email is required"))]
    pub email: String,
    #[validate(length(min = 3, max = 64, message = "username must be 3-64 characters"))]
    pub username: String,
    #[validate(length(min = 8, max = 128, message = "password must be 8-128 characters"))]
    pub password: String,
    #[validate(url)]
    pub avatar: Option<String>,
    #[validate(url)]
    pub cover_image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: String,
}

impl LoginRequest {
    fn identifier(&self) -> AppResult<LoginIdentifier> {
        let email = self.email.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let username = self.username.as_deref().map(str::trim).filter(|s| !s.is_empty());
        match (email, username) {
            (Some(email), None) => Ok(LoginIdentifier::Email(email.to_string())),
            (None, Some(username)) => Ok(LoginIdentifier::Username(username.to_string())),
            (Some(_), Some(_)) => Err(AppError::Validation(
                "Provide either email or username, not both".to_string(),
            )),
            (None, None) => Err(AppError::Validation(
                "email or username is required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: SanitizedUser,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "oldPassword is required"))]
    pub old_password: String,
    #[validate(length(min = 8, max = 128, message = "newPassword must be 8-128 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAccountRequest {
    #[validate(length(min = 1, max = 255))]
    pub fullname: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AvatarRequest {
    #[validate(url(message = "avatar must be a URL"))]
    pub avatar: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CoverImageRequest {
    #[validate(url(message = "coverImage must be a URL"))]
    pub cover_image: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: SanitizedUser,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// POST /api/v1/users/register
pub async fn register(
    State(state): State<AppState>,
    AppJson(body): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    body.validate()?;

    let user = state
        .sessions()
        .register(Registration {
            fullname: body.fullname,
            email: body.email,
            username: body.username,
            password: body.password,
            avatar: body.avatar,
            cover_image: body.cover_image,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse { user })))
}

/// POST /api/v1/users/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(body): AppJson<LoginRequest>,
) -> AppResult<(CookieJar, Json<LoginResponse>)> {
    let identifier = body.identifier()?;
    if body.password.is_empty() {
        return Err(AppError::Validation("password is required".to_string()));
    }

    let session = state.sessions().login(identifier, &body.password).await?;
    let jar = state.cookies().set_tokens(jar, &session.tokens);

    Ok((
        jar,
        Json(LoginResponse {
            user: session.user,
            access_token: session.tokens.access_token,
            refresh_token: session.tokens.refresh_token,
        }),
    ))
}

/// POST /api/v1/users/logout
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<MessageResponse>)> {
    state.sessions().logout(user_id).await?;
    let jar = state.cookies().clear_tokens(jar);
    Ok((
        jar,
        Json(MessageResponse {
            message: "User logged out",
        }),
    ))
}

/// POST /api/v1/users/refresh-token
///
/// The `refreshToken` cookie wins over a token in the body.
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<AppJson<RefreshRequest>>,
) -> AppResult<(CookieJar, Json<TokenPair>)> {
    let presented = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| body.and_then(|AppJson(b)| b.refresh_token));

    let tokens = state.sessions().refresh(presented.as_deref()).await?;
    let jar = state.cookies().set_tokens(jar, &tokens);
    Ok((jar, Json(tokens)))
}

/// POST /api/v1/users/change-password
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(body): AppJson<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    body.validate()?;
    state
        .sessions()
        .change_password(user_id, &body.old_password, &body.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password changed successfully",
    }))
}

/// GET or POST /api/v1/users/current-user
pub async fn current_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<UserResponse>> {
    let user = state.sessions().current_user(user_id).await?;
    Ok(Json(UserResponse { user }))
}

/// PATCH /api/v1/users/update-account
pub async fn update_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(body): AppJson<UpdateAccountRequest>,
) -> AppResult<Json<UserResponse>> {
    body.validate()?;
    let user = state
        .sessions()
        .update_account(
            user_id,
            UserChanges {
                fullname: body.fullname,
                email: body.email,
            },
        )
        .await?;
    Ok(Json(UserResponse { user }))
}

/// PATCH /api/v1/users/avatar
pub async fn update_avatar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(body): AppJson<AvatarRequest>,
) -> AppResult<Json<UserResponse>> {
    body.validate()?;
    let user = state.sessions().update_avatar(user_id, &body.avatar).await?;
    Ok(Json(UserResponse { user }))
}

/// PATCH /api/v1/users/cover-image
pub async fn update_cover_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(body): AppJson<CoverImageRequest>,
) -> AppResult<Json<UserResponse>> {
    body.validate()?;
    let user = state
        .sessions()
        .update_cover_image(user_id, &body.cover_image)
        .await?;
    Ok(Json(UserResponse { user }))
}
