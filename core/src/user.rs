use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::{
        Database,
        user_repo::{CreateSessionParams, CreateUserParams, UserRepositoryRef},
    },
    ids::{SessionId, UserId},
};

pub const SESSION_TTL_SECONDS: i64 = 60 * 60 * 24 * 14;

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub image: Option<String>,
    pub created_at: i64,
}

/// The public projection of a user. Never carries the password hash.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
}

impl From<&UserRecord> for UserProfile {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            email: record.email.clone(),
            image: record.image.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: SessionId,
    pub user_id: UserId,
    pub created_at: i64,
    pub expires_at: i64,
}

impl SessionRecord {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// Emails are compared and stored trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Clone)]
pub struct UserStore {
    user_repo: UserRepositoryRef,
}

impl UserStore {
    pub fn new(database: &Database) -> Self {
        Self {
            user_repo: database.repositories().user_repo(),
        }
    }

    pub async fn create(&self, email: &str, name: &str, password_hash: &str) -> Result<UserRecord> {
        self.user_repo
            .create_user(CreateUserParams {
                id: Uuid::new_v4().to_string(),
                email: normalize_email(email),
                name: name.trim().to_owned(),
                password_hash: password_hash.to_owned(),
                image: None,
                created_at: Utc::now().timestamp(),
            })
            .await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        self.user_repo
            .fetch_user_by_email(&normalize_email(email))
            .await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        self.user_repo.fetch_user_by_id(id).await
    }

    pub async fn create_session(&self, user_id: &UserId) -> Result<SessionRecord> {
        let created_at = Utc::now().timestamp();
        self.user_repo
            .create_session(CreateSessionParams {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                created_at,
                expires_at: created_at + SESSION_TTL_SECONDS,
            })
            .await
    }

    /// Returns the session if it is still live. Expired sessions are deleted.
    pub async fn find_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let Some(record) = self.user_repo.fetch_session(session_id).await? else {
            return Ok(None);
        };

        if record.is_expired(Utc::now().timestamp()) {
            self.user_repo.delete_session(session_id).await?;
            return Ok(None);
        }

        Ok(Some(record))
    }

    /// Slides the expiry of a live session forward.
    pub async fn refresh_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let Some(mut record) = self.find_session(session_id).await? else {
            return Ok(None);
        };

        record.expires_at = Utc::now().timestamp() + SESSION_TTL_SECONDS;
        self.user_repo
            .extend_session(session_id, record.expires_at)
            .await?;
        Ok(Some(record))
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.user_repo.delete_session(session_id).await
    }
}
