use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::{
        Database,
        invitation_repo::{
            AcceptInvitationParams, CreateInvitationParams, InvitationRepositoryRef,
        },
    },
    ids::{InvitationId, UserId, WorkspaceId},
    membership::WorkspaceRole,
    user::normalize_email,
};

/// `pending -> accepted` is the only transition. Expiry is derived from
/// `expires_at` and never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
        }
    }
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvitationStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "pending" => Ok(InvitationStatus::Pending),
            "accepted" => Ok(InvitationStatus::Accepted),
            other => Err(anyhow!("unknown invitation status: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InvitationRecord {
    pub id: InvitationId,
    pub workspace_id: WorkspaceId,
    pub email: String,
    pub invited_by: UserId,
    pub token: String,
    pub status: InvitationStatus,
    pub created_at: i64,
    pub updated_at: i64,
    pub expires_at: Option<i64>,
    pub accepted_by: Option<UserId>,
    pub accepted_at: Option<i64>,
}

impl InvitationRecord {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    pub fn is_redeemable(&self, now: i64) -> bool {
        self.status == InvitationStatus::Pending && !self.is_expired(now)
    }
}

#[derive(Debug, Clone)]
pub struct PendingInvitation {
    pub invitation: InvitationRecord,
    pub inviter_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationAcceptance {
    /// A membership row was created and the invitation consumed.
    Joined,
    /// The user already held a membership; no row was added.
    AlreadyMember,
    /// The invitation stopped being redeemable before the write landed.
    Superseded,
}

#[derive(Clone)]
pub struct InvitationStore {
    invitation_repo: InvitationRepositoryRef,
}

impl InvitationStore {
    pub fn new(database: &Database) -> Self {
        Self {
            invitation_repo: database.repositories().invitation_repo(),
        }
    }

    pub async fn create(
        &self,
        workspace_id: &str,
        email: &str,
        invited_by: &str,
        token: &str,
        ttl_seconds: Option<i64>,
    ) -> Result<InvitationRecord> {
        let created_at = Utc::now().timestamp();
        self.invitation_repo
            .insert_invitation(CreateInvitationParams {
                id: Uuid::new_v4().to_string(),
                workspace_id: workspace_id.to_owned(),
                email: normalize_email(email),
                invited_by: invited_by.to_owned(),
                token: token.to_owned(),
                created_at,
                expires_at: ttl_seconds.map(|ttl| created_at.saturating_add(ttl)),
            })
            .await
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Option<InvitationRecord>> {
        self.invitation_repo.fetch_invitation_by_token(token).await
    }

    pub async fn find_in_workspace(
        &self,
        workspace_id: &str,
        invitation_id: &str,
    ) -> Result<Option<InvitationRecord>> {
        self.invitation_repo
            .fetch_invitation(workspace_id, invitation_id)
            .await
    }

    /// The pending row for `(workspace, email)`, expired or not.
    pub async fn find_pending_for_email(
        &self,
        workspace_id: &str,
        email: &str,
    ) -> Result<Option<InvitationRecord>> {
        self.invitation_repo
            .fetch_pending_for_email(workspace_id, &normalize_email(email))
            .await
    }

    pub async fn delete(&self, invitation_id: &str) -> Result<bool> {
        self.invitation_repo.delete_invitation(invitation_id).await
    }

    /// Unexpired pending invitations, newest first.
    pub async fn list_pending(&self, workspace_id: &str) -> Result<Vec<PendingInvitation>> {
        self.invitation_repo
            .list_pending_with_inviter(workspace_id, Utc::now().timestamp())
            .await
    }

    pub async fn accept(
        &self,
        invitation: &InvitationRecord,
        user_id: &str,
    ) -> Result<InvitationAcceptance> {
        self.invitation_repo
            .accept_invitation(AcceptInvitationParams {
                invitation_id: invitation.id.to_string(),
                workspace_id: invitation.workspace_id.to_string(),
                user_id: user_id.to_owned(),
                role: WorkspaceRole::Member,
                accepted_at: Utc::now().timestamp(),
            })
            .await
    }
}
