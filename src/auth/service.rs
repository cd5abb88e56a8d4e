//! Session controller: register, login, refresh rotation, logout and password change.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::jwt::TokenIssuer;
use crate::auth::password::{hash_password, verify_password};
use crate::db::UserStore;
use crate::error::{AppError, AppResult};
use crate::models::{refresh_token_fingerprint, NewUser, SanitizedUser, TokenPair, UserChanges};

/// The single field a login is looked up by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginIdentifier {
    Email(String),
    Username(String),
}

/// Account fields supplied at registration, already validated for shape.
#[derive(Debug, Clone)]
pub struct Registration {
    pub fullname: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: SanitizedUser,
    pub tokens: TokenPair,
}

#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn UserStore>,
    tokens: TokenIssuer,
}

impl SessionService {
    pub fn new(store: Arc<dyn UserStore>, tokens: TokenIssuer) -> Self {
        Self { store, tokens }
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub async fn register(&self, reg: Registration) -> AppResult<SanitizedUser> {
        let fullname = trimmed("fullname", &reg.fullname, FULLNAME_LEN)?;
        let username = trimmed("username", &reg.username, USERNAME_LEN)?.to_lowercase();
        let email = normalize(&reg.email);

        if self.store.find_by_email(&email).await?.is_some()
            || self.store.find_by_username(&username).await?.is_some()
        {
            return Err(AppError::Conflict(
                "Username or email already exists".to_string(),
            ));
        }

        let password_hash = hash_password(&reg.password).await?;
        let user = self
            .store
            .create(NewUser {
                username,
                email,
                fullname,
                avatar: reg.avatar,
                cover_image: reg.cover_image,
                password_hash,
            })
            .await?;
        info!(user_id = %user.id, "user registered");
        Ok(user.into())
    }

    /// Verify credentials and open a session, replacing any previous one.
    pub async fn login(&self, identifier: LoginIdentifier, password: &str) -> AppResult<Session> {
        let user = match &identifier {
            LoginIdentifier::Email(email) => self.store.find_by_email(&normalize(email)).await?,
            LoginIdentifier::Username(name) => {
                self.store.find_by_username(&normalize(name)).await?
            }
        }
        .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

        if !verify_password(password, &user.password_hash).await? {
            return Err(AppError::Unauthorized("Invalid user credentials".to_string()));
        }

        let tokens = self.issue_pair(user.id)?;
        self.store
            .store_refresh_token(user.id, &refresh_token_fingerprint(&tokens.refresh_token))
            .await?;
        info!(user_id = %user.id, "user logged in");

        Ok(Session {
            user: user.into(),
            tokens,
        })
    }

    /// Exchange the current refresh token for a new pair. The presented token
    /// stops working as soon as this succeeds.
    pub async fn refresh(&self, presented: Option<&str>) -> AppResult<TokenPair> {
        let presented = presented
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Refresh token missing".to_string()))?;

        let user_id = self.tokens.verify_refresh_token(presented)?;
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::InvalidToken("Invalid refresh token".to_string()))?;

        let tokens = self.issue_pair(user.id)?;
        let rotated = self
            .store
            .rotate_refresh_token(
                user.id,
                &refresh_token_fingerprint(presented),
                &refresh_token_fingerprint(&tokens.refresh_token),
            )
            .await?;
        if !rotated {
            warn!(user_id = %user.id, "refresh token reuse rejected");
            return Err(AppError::TokenReuse);
        }

        info!(user_id = %user.id, "session refreshed");
        Ok(tokens)
    }

    pub async fn logout(&self, user_id: Uuid) -> AppResult<()> {
        self.store.revoke_refresh_token(user_id).await?;
        info!(user_id = %user_id, "user logged out");
        Ok(())
    }

    /// Replace the password after re-checking the old one. Outstanding
    /// refresh tokens are revoked along with it.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if !verify_password(old_password, &user.password_hash).await? {
            return Err(AppError::Unauthorized("Invalid old password".to_string()));
        }

        let password_hash = hash_password(new_password).await?;
        self.store
            .update_password_and_revoke(user.id, &password_hash)
            .await?;
        info!(user_id = %user.id, "password changed, sessions revoked");
        Ok(())
    }

    pub async fn current_user(&self, user_id: Uuid) -> AppResult<SanitizedUser> {
        self.store
            .find_by_id(user_id)
            .await?
            .map(SanitizedUser::from)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn update_account(
        &self,
        user_id: Uuid,
        changes: UserChanges,
    ) -> AppResult<SanitizedUser> {
        let changes = UserChanges {
            fullname: changes
                .fullname
                .map(|f| trimmed("fullname", &f, FULLNAME_LEN))
                .transpose()?,
            email: changes.email.as_deref().map(normalize),
        };
        if changes.fullname.is_none() && changes.email.is_none() {
            return Err(AppError::Validation(
                "fullname or email is required".to_string(),
            ));
        }
        let user = self.store.update_details(user_id, changes).await?;
        Ok(user.into())
    }

    pub async fn update_avatar(&self, user_id: Uuid, url: &str) -> AppResult<SanitizedUser> {
        let user = self.store.update_avatar(user_id, url.trim()).await?;
        info!(user_id = %user.id, "avatar updated");
        Ok(user.into())
    }

    pub async fn update_cover_image(&self, user_id: Uuid, url: &str) -> AppResult<SanitizedUser> {
        let user = self.store.update_cover_image(user_id, url.trim()).await?;
        info!(user_id = %user.id, "cover image updated");
        Ok(user.into())
    }

    fn issue_pair(&self, user_id: Uuid) -> AppResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.tokens.issue_access_token(user_id)?,
            refresh_token: self.tokens.issue_refresh_token(user_id)?,
        })
    }
}

const FULLNAME_LEN: (usize, usize) = (1, 255);
const USERNAME_LEN: (usize, usize) = (3, 64);

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Trim `value` and check its length in characters against `(min, max)`.
fn trimmed(field: &str, value: &str, (min, max): (usize, usize)) -> AppResult<String> {
    let value = value.trim();
    let len = value.chars().count();
    if len < min || len > max {
        return Err(AppError::Validation(format!(
            "{} must be {}-{} characters",
            field, min, max
        )));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryUserStore;
    use chrono::Duration;
    use tokio_test::{assert_err, assert_ok};

    const ACCESS_SECRET: &str = "test-access-secret";
    const REFRESH_SECRET: &str = "test-refresh-secret";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            ACCESS_SECRET,
            REFRESH_SECRET,
            Duration::minutes(15),
            Duration::days(10),
        )
    }

    fn service() -> (SessionService, MemoryUserStore) {
        let store = MemoryUserStore::new();
        (SessionService::new(Arc::new(store.clone()), issuer()), store)
    }

    fn registration(username: &str, password: &str) -> Registration {
        Registration {
            fullname: format!("{} Example", username),
            email: format!("{}@example.com", username),
            username: username.to_string(),
            password: password.to_string(),
            avatar: Some("https://cdn.example.com/avatar.png".to_string()),
            cover_image: None,
        }
    }

    fn email(username: &str) -> LoginIdentifier {
        LoginIdentifier::Email(format!("{}@example.com", username))
    }

    #[tokio::test]
    async fn login_persists_the_returned_refresh_token() {
        let (svc, store) = service();
        svc.register(registration("alice", "password123")).await.unwrap();

        let session = svc.login(email("alice"), "password123").await.unwrap();
        assert!(!session.tokens.access_token.is_empty());
        assert!(!session.tokens.refresh_token.is_empty());
        assert_eq!(session.user.username, "alice");

        let stored = store.refresh_token_hash(session.user.id).await.unwrap();
        assert_eq!(
            stored,
            Some(refresh_token_fingerprint(&session.tokens.refresh_token))
        );
    }

    #[tokio::test]
    async fn login_by_username_is_case_insensitive() {
        let (svc, _) = service();
        svc.register(registration("Alice", "password123")).await.unwrap();
        let session = svc
            .login(LoginIdentifier::Username(" ALICE ".into()), "password123")
            .await;
        assert_ok!(session);
    }

    #[tokio::test]
    async fn wrong_password_issues_nothing() {
        let (svc, store) = service();
        let user = svc.register(registration("alice", "password123")).await.unwrap();

        let err = svc.login(email("alice"), "not-my-password").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert!(store.refresh_token_hash(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let (svc, _) = service();
        let err = svc.login(email("nobody"), "password123").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn register_rejects_taken_email_or_username() {
        let (svc, _) = service();
        svc.register(registration("alice", "password123")).await.unwrap();

        let mut same_email = registration("alice2", "password123");
        same_email.email = "ALICE@example.com".to_string();
        assert!(matches!(
            svc.register(same_email).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            svc.register(registration("alice", "password123")).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn refresh_rotates_and_rejects_the_old_token() {
        let (svc, store) = service();
        svc.register(registration("alice", "password123")).await.unwrap();
        let session = svc.login(email("alice"), "password123").await.unwrap();
        let old = session.tokens.refresh_token;

        let rotated = svc.refresh(Some(&old)).await.unwrap();
        assert_ne!(rotated.refresh_token, old);
        assert_eq!(
            store.refresh_token_hash(session.user.id).await.unwrap(),
            Some(refresh_token_fingerprint(&rotated.refresh_token))
        );

        let err = svc.refresh(Some(&old)).await.unwrap_err();
        assert!(matches!(err, AppError::TokenReuse));
        // a rejected replay leaves the live token usable
        assert_ok!(svc.refresh(Some(&rotated.refresh_token)).await);
    }

    #[tokio::test]
    async fn missing_refresh_token_is_unauthorized() {
        let (svc, _) = service();
        assert!(matches!(
            svc.refresh(None).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            svc.refresh(Some("")).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn tampered_or_expired_refresh_leaves_state_alone() {
        let (svc, store) = service();
        svc.register(registration("alice", "password123")).await.unwrap();
        let session = svc.login(email("alice"), "password123").await.unwrap();
        let before = store.refresh_token_hash(session.user.id).await.unwrap();

        let tampered = format!("{}x", session.tokens.refresh_token);
        assert!(matches!(
            svc.refresh(Some(&tampered)).await,
            Err(AppError::InvalidToken(_))
        ));

        let expired_issuer = TokenIssuer::new(
            ACCESS_SECRET,
            REFRESH_SECRET,
            Duration::minutes(15),
            Duration::seconds(-10),
        );
        let expired = expired_issuer
            .issue_refresh_token(session.user.id)
            .unwrap();
        assert!(matches!(
            svc.refresh(Some(&expired)).await,
            Err(AppError::InvalidToken(_))
        ));

        assert_eq!(store.refresh_token_hash(session.user.id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn refresh_for_deleted_user_is_invalid() {
        let (svc, _) = service();
        let orphan = svc.tokens().issue_refresh_token(Uuid::new_v4()).unwrap();
        assert!(matches!(
            svc.refresh(Some(&orphan)).await,
            Err(AppError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn access_token_cannot_refresh() {
        let (svc, _) = service();
        svc.register(registration("alice", "password123")).await.unwrap();
        let session = svc.login(email("alice"), "password123").await.unwrap();
        assert!(matches!(
            svc.refresh(Some(&session.tokens.access_token)).await,
            Err(AppError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn logout_blocks_later_refresh() {
        let (svc, store) = service();
        svc.register(registration("alice", "password123")).await.unwrap();
        let session = svc.login(email("alice"), "password123").await.unwrap();

        svc.logout(session.user.id).await.unwrap();
        assert!(store.refresh_token_hash(session.user.id).await.unwrap().is_none());
        assert_err!(svc.refresh(Some(&session.tokens.refresh_token)).await);
        // logging out twice is harmless
        assert_ok!(svc.logout(session.user.id).await);
    }

    #[tokio::test]
    async fn wrong_old_password_keeps_hash() {
        let (svc, store) = service();
        let user = svc.register(registration("alice", "password123")).await.unwrap();
        let before = store.find_by_id(user.id).await.unwrap().unwrap().password_hash;

        let err = svc
            .change_password(user.id, "wrong-password", "newpassword456")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        let after = store.find_by_id(user.id).await.unwrap().unwrap().password_hash;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn changed_password_replaces_old_and_revokes_session() {
        let (svc, _) = service();
        let user = svc.register(registration("alice", "password123")).await.unwrap();
        let session = svc.login(email("alice"), "password123").await.unwrap();

        svc.change_password(user.id, "password123", "newpassword456")
            .await
            .unwrap();

        assert!(matches!(
            svc.refresh(Some(&session.tokens.refresh_token)).await,
            Err(AppError::TokenReuse)
        ));
        assert_ok!(svc.login(email("alice"), "newpassword456").await);
        assert!(matches!(
            svc.login(email("alice"), "password123").await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_refresh_has_one_winner() {
        let (svc, _) = service();
        svc.register(registration("alice", "password123")).await.unwrap();
        let token = svc
            .login(email("alice"), "password123")
            .await
            .unwrap()
            .tokens
            .refresh_token;

        let (a, b) = tokio::join!(svc.refresh(Some(&token)), svc.refresh(Some(&token)));
        let wins = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(wins, 1);
        let loser = if a.is_err() { a } else { b };
        assert!(matches!(loser, Err(AppError::TokenReuse)));
    }

    #[tokio::test]
    async fn alice_full_session_lifecycle() {
        let (svc, _) = service();
        svc.register(registration("alice", "password123")).await.unwrap();

        let t1 = svc.login(email("alice"), "password123").await.unwrap();
        let t2 = svc.refresh(Some(&t1.tokens.refresh_token)).await.unwrap();
        assert!(matches!(
            svc.refresh(Some(&t1.tokens.refresh_token)).await,
            Err(AppError::TokenReuse)
        ));

        svc.logout(t1.user.id).await.unwrap();
        assert!(matches!(
            svc.refresh(Some(&t2.refresh_token)).await,
            Err(AppError::TokenReuse)
        ));
    }

    #[tokio::test]
    async fn register_checks_lengths_after_trimming() {
        let (svc, _) = service();

        let mut padded = registration("bob", "password123");
        padded.username = "  b  ".to_string();
        assert!(matches!(
            svc.register(padded).await,
            Err(AppError::Validation(_))
        ));

        let mut blank = registration("bob", "password123");
        blank.fullname = "   ".to_string();
        assert!(matches!(
            svc.register(blank).await,
            Err(AppError::Validation(_))
        ));

        let mut spaced = registration("bob", "password123");
        spaced.username = "  Bob  ".to_string();
        spaced.fullname = "  Bob Example ".to_string();
        let user = svc.register(spaced).await.unwrap();
        assert_eq!(user.username, "bob");
        assert_eq!(user.fullname, "Bob Example");
    }

    #[tokio::test]
    async fn blank_fullname_update_is_rejected() {
        let (svc, store) = service();
        let user = svc.register(registration("alice", "password123")).await.unwrap();

        let err = svc
            .update_account(
                user.id,
                UserChanges {
                    fullname: Some("   ".into()),
                    email: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.fullname, "alice Example");
    }

    #[tokio::test]
    async fn image_urls_are_replaced() {
        let (svc, _) = service();
        let user = svc.register(registration("alice", "password123")).await.unwrap();

        let updated = svc
            .update_avatar(user.id, " https://cdn.example.com/new.png ")
            .await
            .unwrap();
        assert_eq!(updated.avatar.as_deref(), Some("https://cdn.example.com/new.png"));

        let updated = svc
            .update_cover_image(user.id, "https://cdn.example.com/cover.png")
            .await
            .unwrap();
        assert_eq!(updated.cover_image.as_deref(), Some("https://cdn.example.com/cover.png"));
        assert_eq!(svc.current_user(user.id).await.unwrap(), updated);

        assert!(matches!(
            svc.update_avatar(Uuid::new_v4(), "https://cdn.example.com/x.png").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_account_requires_a_change() {
        let (svc, _) = service();
        let user = svc.register(registration("alice", "password123")).await.unwrap();

        assert!(matches!(
            svc.update_account(user.id, UserChanges::default()).await,
            Err(AppError::Validation(_))
        ));

        let updated = svc
            .update_account(
                user.id,
                UserChanges {
                    fullname: Some("Alice L.".into()),
                    email: Some("Alice.L@Example.com".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.fullname, "Alice L.");
        assert_eq!(updated.email, "alice.l@example.com");
        assert_eq!(svc.current_user(user.id).await.unwrap(), updated);
    }
}
