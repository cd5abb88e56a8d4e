//! Credential cookies set on login/refresh and cleared on logout.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::models::TokenPair;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Attributes shared by both credential cookies.
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    /// Only set `Secure` in production so local HTTP development still works.
    pub secure: bool,
    pub same_site: SameSite,
}

impl CookiePolicy {
    pub fn new(secure: bool, same_site: SameSite) -> Self {
        Self { secure, same_site }
    }

    fn build(&self, name: &'static str, value: String) -> Cookie<'static> {
        Cookie::build((name, value))
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site)
            .path("/")
            .build()
    }

    /// Add both token cookies to the jar.
    pub fn set_tokens(&self, jar: CookieJar, tokens: &TokenPair) -> CookieJar {
        jar.add(self.build(ACCESS_COOKIE, tokens.access_token.clone()))
            .add(self.build(REFRESH_COOKIE, tokens.refresh_token.clone()))
    }

    fn expired(&self, name: &'static str) -> Cookie<'static> {
        let mut cookie = self.build(name, String::new());
        cookie.make_removal();
        cookie
    }

    /// Expire both token cookies, whether or not the request carried them.
    pub fn clear_tokens(&self, jar: CookieJar) -> CookieJar {
        jar.add(self.expired(ACCESS_COOKIE))
            .add(self.expired(REFRESH_COOKIE))
    }
}
