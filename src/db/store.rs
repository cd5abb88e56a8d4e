//! Credential store interface shared by the PostgreSQL and in-memory backends.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{NewUser, User, UserChanges};

/// User records plus the single refresh-token session each user may hold.
///
/// Refresh tokens are passed in as fingerprints (see
/// [`refresh_token_fingerprint`](crate::models::refresh_token_fingerprint)), never plaintext.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;

    /// Insert a user. Fails with `Conflict` if the email or username is taken.
    async fn create(&self, user: NewUser) -> AppResult<User>;

    /// Apply account changes. Fails with `NotFound` for an unknown id and
    /// `Conflict` if the new email is taken.
    async fn update_details(&self, id: Uuid, changes: UserChanges) -> AppResult<User>;

    /// Set the avatar URL. Fails with `NotFound` for an unknown id.
    async fn update_avatar(&self, id: Uuid, url: &str) -> AppResult<User>;

    async fn update_cover_image(&self, id: Uuid, url: &str) -> AppResult<User>;

    /// Replace the password hash and drop the user's session in one step.
    async fn update_password_and_revoke(&self, id: Uuid, password_hash: &str) -> AppResult<()>;

    /// Start a session, replacing any previous one.
    async fn store_refresh_token(&self, user_id: Uuid, token_hash: &str) -> AppResult<()>;

    /// Swap `current_hash` for `new_hash` only if `current_hash` is still the
    /// stored value. Returns `false` when nothing was swapped.
    async fn rotate_refresh_token(
        &self,
        user_id: Uuid,
        current_hash: &str,
        new_hash: &str,
    ) -> AppResult<bool>;

    /// End the user's session. A no-op when none exists.
    async fn revoke_refresh_token(&self, user_id: Uuid) -> AppResult<()>;

    async fn refresh_token_hash(&self, user_id: Uuid) -> AppResult<Option<String>>;
}
