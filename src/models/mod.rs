//! Data models for users and tokens.

pub mod token;
pub mod user;

pub use token::*;
pub use user::*;
