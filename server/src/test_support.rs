#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, header::COOKIE};
use tempfile::TempDir;

use taskdeck_core::{
    config::AppConfig,
    db::Database,
    membership::WorkspaceRole,
    user::UserRecord,
    workspace::WorkspaceRecord,
};

use crate::{
    auth::generate_password_hash,
    cookies::SESSION_COOKIE_NAME,
    mail::{InvitationMail, Mailer, MailerRef},
    state::{AppState, build_state_with_mailer},
};

pub(crate) const TEST_PASSWORD: &str = "password123";

/// Keeps every mail it is asked to send.
#[derive(Clone, Default)]
pub(crate) struct RecordingMailer {
    sent: Arc<Mutex<Vec<InvitationMail>>>,
}

impl RecordingMailer {
    pub(crate) fn sent(&self) -> Vec<InvitationMail> {
        self.sent.lock().expect("mailer lock").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_invitation(&self, mail: &InvitationMail) -> Result<()> {
        self.sent.lock().expect("mailer lock").push(mail.clone());
        Ok(())
    }
}

pub(crate) struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send_invitation(&self, _mail: &InvitationMail) -> Result<()> {
        Err(anyhow!("smtp relay unavailable"))
    }
}

/// Never finishes a delivery.
pub(crate) struct StallingMailer;

#[async_trait]
impl Mailer for StallingMailer {
    async fn send_invitation(&self, _mail: &InvitationMail) -> Result<()> {
        std::future::pending().await
    }
}

pub(crate) async fn setup_state() -> (TempDir, AppState) {
    setup_state_with(AppConfig::default(), Arc::new(RecordingMailer::default())).await
}

pub(crate) async fn setup_state_with(
    mut config: AppConfig,
    mailer: MailerRef,
) -> (TempDir, AppState) {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    config.database_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .into_owned();

    let database = Database::connect(&config).await.expect("connect database");
    let state = build_state_with_mailer(&database, &config, mailer);
    (temp_dir, state)
}

/// Users are named after the local part of their email.
pub(crate) async fn seed_user(state: &AppState, email: &str) -> UserRecord {
    let password_hash = generate_password_hash(TEST_PASSWORD).expect("hash password");
    let name = email.split('@').next().unwrap_or("user");
    state
        .user_store
        .create(email, name, &password_hash)
        .await
        .expect("create user")
}

pub(crate) async fn seed_workspace(
    state: &AppState,
    owner: &UserRecord,
    name: &str,
) -> WorkspaceRecord {
    state
        .workspace_store
        .create(&owner.id, name)
        .await
        .expect("create workspace")
}

pub(crate) async fn seed_member(
    state: &AppState,
    workspace: &WorkspaceRecord,
    email: &str,
    role: WorkspaceRole,
) -> UserRecord {
    let user = seed_user(state, email).await;
    state
        .membership_store
        .add_member(&workspace.id, &user.id, role)
        .await
        .expect("add member");
    user
}

pub(crate) async fn count_members(state: &AppState, workspace_id: &str, user_id: &str) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM workspace_members WHERE workspace_id = ? AND user_id = ?",
    )
    .bind(workspace_id)
    .bind(user_id)
    .fetch_one(state.database.pool())
    .await
    .expect("count members")
}

/// Headers carrying a fresh session cookie for `user`.
pub(crate) async fn session_headers(state: &AppState, user: &UserRecord) -> HeaderMap {
    let session = state
        .user_store
        .create_session(&user.id)
        .await
        .expect("create session");
    let mut headers = HeaderMap::new();
    headers.insert(
        COOKIE,
        HeaderValue::from_str(&format!("{SESSION_COOKIE_NAME}={}", session.id))
            .expect("cookie header"),
    );
    headers
}
