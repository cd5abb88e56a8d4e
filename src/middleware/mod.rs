//! Request extractors shared by the account routes.

pub mod auth;
pub mod json;

pub use auth::AuthUser;
pub use json::AppJson;
