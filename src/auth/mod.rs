//! Authentication: password hashing, JWT issuance, session lifecycle and account routes.

mod cookies;
mod handlers;
mod jwt;
mod password;
mod service;

pub use cookies::{CookiePolicy, ACCESS_COOKIE, REFRESH_COOKIE};
pub use handlers::{
    change_password, current_user, login, logout, refresh_token, register, update_account,
    update_avatar, update_cover_image,
};
pub use jwt::{Claims, TokenIssuer, TokenKind};
pub use password::{hash_password, verify_password};
pub use service::{LoginIdentifier, Registration, Session, SessionService};
