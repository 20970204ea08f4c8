use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::user::{SessionRecord, UserRecord};

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub image: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct CreateSessionParams {
    pub id: String,
    pub user_id: String,
    pub created_at: i64,
    pub expires_at: i64,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord>;

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    async fn fetch_user_by_id(&self, id: &str) -> Result<Option<UserRecord>>;

    async fn create_session(&self, params: CreateSessionParams) -> Result<SessionRecord>;

    async fn fetch_session(&self, session_id: &str) -> Result<Option<SessionRecord>>;

    async fn extend_session(&self, session_id: &str, expires_at: i64) -> Result<()>;

    async fn delete_session(&self, session_id: &str) -> Result<()>;
}

pub type UserRepositoryRef = Arc<dyn UserRepository>;
