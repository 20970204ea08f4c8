use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    invitation::{InvitationAcceptance, InvitationRecord, PendingInvitation},
    membership::WorkspaceRole,
};

#[derive(Debug, Clone)]
pub struct CreateInvitationParams {
    pub id: String,
    pub workspace_id: String,
    pub email: String,
    pub invited_by: String,
    pub token: String,
    pub created_at: i64,
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct AcceptInvitationParams {
    pub invitation_id: String,
    pub workspace_id: String,
    pub user_id: String,
    pub role: WorkspaceRole,
    pub accepted_at: i64,
}

#[async_trait]
pub trait InvitationRepository: Send + Sync {
    async fn insert_invitation(&self, params: CreateInvitationParams) -> Result<InvitationRecord>;

    async fn fetch_invitation_by_token(&self, token: &str) -> Result<Option<InvitationRecord>>;

    async fn fetch_invitation(
        &self,
        workspace_id: &str,
        invitation_id: &str,
    ) -> Result<Option<InvitationRecord>>;

    async fn fetch_pending_for_email(
        &self,
        workspace_id: &str,
        email: &str,
    ) -> Result<Option<InvitationRecord>>;

    async fn delete_invitation(&self, invitation_id: &str) -> Result<bool>;

    async fn list_pending_with_inviter(
        &self,
        workspace_id: &str,
        now: i64,
    ) -> Result<Vec<PendingInvitation>>;

    /// Adds the membership and flips the invitation to accepted in one
    /// transaction.
    async fn accept_invitation(&self, params: AcceptInvitationParams)
    -> Result<InvitationAcceptance>;
}

pub type InvitationRepositoryRef = Arc<dyn InvitationRepository>;
