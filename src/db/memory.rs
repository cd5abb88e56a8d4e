//! In-process credential store, used when no database is configured and in tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::UserStore;
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, User, UserChanges};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    /// user_id -> refresh token fingerprint
    sessions: HashMap<Uuid, String>,
}

/// [`UserStore`] kept in memory behind one lock, so every operation is atomic.
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn modify<F>(&self, id: Uuid, apply: F) -> AppResult<User>
    where
        F: FnOnce(&mut User) + Send,
    {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        apply(user);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn create(&self, user: NewUser) -> AppResult<User> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.email == user.email || u.username == user.username)
        {
            return Err(AppError::Conflict(
                "Username or email already exists".to_string(),
            ));
        }
        let now = Utc::now();
        let row = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            fullname: user.fullname,
            avatar: user.avatar,
            cover_image: user.cover_image,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_details(&self, id: Uuid, changes: UserChanges) -> AppResult<User> {
        let mut tables = self.tables.write().await;
        if let Some(email) = &changes.email {
            if tables.users.values().any(|u| u.id != id && &u.email == email) {
                return Err(AppError::Conflict("Email already in use".to_string()));
            }
        }
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        if let Some(fullname) = changes.fullname {
            user.fullname = fullname;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_avatar(&self, id: Uuid, url: &str) -> AppResult<User> {
        self.modify(id, |user| user.avatar = Some(url.to_string())).await
    }

    async fn update_cover_image(&self, id: Uuid, url: &str) -> AppResult<User> {
        self.modify(id, |user| user.cover_image = Some(url.to_string())).await
    }

    async fn update_password_and_revoke(&self, id: Uuid, password_hash: &str) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        tables.sessions.remove(&id);
        Ok(())
    }

    async fn store_refresh_token(&self, user_id: Uuid, token_hash: &str) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        tables.sessions.insert(user_id, token_hash.to_string());
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        user_id: Uuid,
        current_hash: &str,
        new_hash: &str,
    ) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.sessions.get_mut(&user_id) {
            Some(stored) if stored == current_hash => {
                *stored = new_hash.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_refresh_token(&self, user_id: Uuid) -> AppResult<()> {
        self.tables.write().await.sessions.remove(&user_id);
        Ok(())
    }

    async fn refresh_token_hash(&self, user_id: Uuid) -> AppResult<Option<String>> {
        Ok(self.tables.read().await.sessions.get(&user_id).cloned())
    }
}
