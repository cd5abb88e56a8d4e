//! HTTP state and non-account handlers.

pub mod http;

pub use http::*;
