//! JSON body extractor whose rejections use the application error envelope.

use axum::extract::FromRequest;

use crate::error::AppError;

/// Like [`axum::Json`], but a missing, malformed or mistyped body is rejected
/// as [`AppError`] instead of axum's plain-text response.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
