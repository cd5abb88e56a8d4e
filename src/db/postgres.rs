//! PostgreSQL-backed credential store.

use async_trait::async_trait;
use uuid::Uuid;

use super::{DbPool, UserStore};
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, User, UserChanges};

const USER_COLUMNS: &str =
    "id, username, email, fullname, avatar, cover_image, password_hash, created_at, updated_at";

/// [`UserStore`] over the `users` and `user_sessions` tables.
#[derive(Clone)]
pub struct PgUserStore {
    pool: DbPool,
}

impl PgUserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn unique_violation(e: sqlx::Error, message: &str) -> AppError {
    let is_unique = e
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if is_unique {
        AppError::Conflict(message.to_string())
    } else {
        AppError::Db(e)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create(&self, user: NewUser) -> AppResult<User> {
        let row = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, fullname, avatar, cover_image, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.fullname)
        .bind(&user.avatar)
        .bind(&user.cover_image)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Username or email already exists"))?;
        Ok(row)
    }

    async fn update_details(&self, id: Uuid, changes: UserChanges) -> AppResult<User> {
        let row = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET fullname = COALESCE($2, fullname),
                email = COALESCE($3, email),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.fullname)
        .bind(&changes.email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Email already in use"))?;
        row.ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    async fn update_avatar(&self, id: Uuid, url: &str) -> AppResult<User> {
        let row = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET avatar = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    async fn update_cover_image(&self, id: Uuid, url: &str) -> AppResult<User> {
        let row = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET cover_image = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    async fn update_password_and_revoke(&self, id: Uuid, password_hash: &str) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        let r = sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&mut *tx)
            .await?;
        if r.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        sqlx::query("DELETE FROM user_sessions WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn store_refresh_token(&self, user_id: Uuid, token_hash: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_sessions (user_id, token_hash)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE
            SET token_hash = EXCLUDED.token_hash, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        user_id: Uuid,
        current_hash: &str,
        new_hash: &str,
    ) -> AppResult<bool> {
        let r = sqlx::query(
            "UPDATE user_sessions SET token_hash = $3, updated_at = NOW() WHERE user_id = $1 AND token_hash = $2",
        )
        .bind(user_id)
        .bind(current_hash)
        .bind(new_hash)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() == 1)
    }

    async fn revoke_refresh_token(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM user_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn refresh_token_hash(&self, user_id: Uuid) -> AppResult<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT token_hash FROM user_sessions WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(hash,)| hash))
    }
}
