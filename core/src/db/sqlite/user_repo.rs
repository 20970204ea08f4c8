use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::user_repo::{CreateSessionParams, CreateUserParams, UserRepository},
    ids::{SessionId, UserId},
    user::{SessionRecord, UserRecord},
};

pub struct SqliteUserRepository {
    pool: Pool<Sqlite>,
}

impl SqliteUserRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_user_row(row: SqliteRow) -> UserRecord {
        UserRecord {
            id: UserId::from(row.get::<String, _>("id")),
            email: row.get("email"),
            name: row.get("name"),
            password_hash: row.get("password_hash"),
            image: row.get("image"),
            created_at: row.get("created_at"),
        }
    }

    fn map_session_row(row: SqliteRow) -> SessionRecord {
        SessionRecord {
            id: SessionId::from(row.get::<String, _>("id")),
            user_id: UserId::from(row.get::<String, _>("user_id")),
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
        }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord> {
        let CreateUserParams {
            id,
            email,
            name,
            password_hash,
            image,
            created_at,
        } = params;

        sqlx::query(
            "INSERT INTO users (id, email, name, password_hash, image, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&email)
        .bind(&name)
        .bind(&password_hash)
        .bind(image.as_deref())
        .bind(created_at)
        .execute(&self.pool)
        .await
        .context("failed to insert user")?;

        Ok(UserRecord {
            id: UserId::from(id),
            email,
            name,
            password_hash,
            image,
            created_at,
        })
    }

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query(
            "SELECT id, email, name, password_hash, image, created_at
             FROM users
             WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::map_user_row))
    }

    async fn fetch_user_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query(
            "SELECT id, email, name, password_hash, image, created_at
             FROM users
             WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::map_user_row))
    }

    async fn create_session(&self, params: CreateSessionParams) -> Result<SessionRecord> {
        let CreateSessionParams {
            id,
            user_id,
            created_at,
            expires_at,
        } = params;

        sqlx::query(
            "INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&user_id)
        .bind(created_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(SessionRecord {
            id: SessionId::from(id),
            user_id: UserId::from(user_id),
            created_at,
            expires_at,
        })
    }

    async fn fetch_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let row =
            sqlx::query("SELECT id, user_id, created_at, expires_at FROM sessions WHERE id = ?")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Self::map_session_row))
    }

    async fn extend_session(&self, session_id: &str, expires_at: i64) -> Result<()> {
        sqlx::query("UPDATE sessions SET expires_at = ? WHERE id = ?")
            .bind(expires_at)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
