use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    db::{
        Database,
        membership_repo::{InsertMemberParams, MembershipRepositoryRef},
    },
    ids::{UserId, WorkspaceId},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceRole {
    Owner,
    Admin,
    Member,
}

impl WorkspaceRole {
    /// Roles allowed to invite, rename and manage members.
    pub const MANAGERS: &'static [WorkspaceRole] = &[WorkspaceRole::Owner, WorkspaceRole::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceRole::Owner => "owner",
            WorkspaceRole::Admin => "admin",
            WorkspaceRole::Member => "member",
        }
    }
}

impl fmt::Display for WorkspaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkspaceRole {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "owner" => Ok(WorkspaceRole::Owner),
            "admin" => Ok(WorkspaceRole::Admin),
            "member" => Ok(WorkspaceRole::Member),
            other => Err(anyhow!("unknown workspace role: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MembershipRecord {
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub role: WorkspaceRole,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberWithUser {
    pub user_id: UserId,
    pub role: WorkspaceRole,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub joined_at: i64,
}

#[derive(Clone)]
pub struct MembershipStore {
    membership_repo: MembershipRepositoryRef,
}

impl MembershipStore {
    pub fn new(database: &Database) -> Self {
        Self {
            membership_repo: database.repositories().membership_repo(),
        }
    }

    pub async fn find_member(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Option<MembershipRecord>> {
        self.membership_repo
            .fetch_member(workspace_id, user_id)
            .await
    }

    pub async fn find_role(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Option<WorkspaceRole>> {
        Ok(self
            .find_member(workspace_id, user_id)
            .await?
            .map(|member| member.role))
    }

    pub async fn is_member(&self, workspace_id: &str, user_id: &str) -> Result<bool> {
        Ok(self.find_member(workspace_id, user_id).await?.is_some())
    }

    pub async fn has_role(
        &self,
        workspace_id: &str,
        user_id: &str,
        allowed: &[WorkspaceRole],
    ) -> Result<bool> {
        Ok(self
            .find_role(workspace_id, user_id)
            .await?
            .is_some_and(|role| allowed.contains(&role)))
    }

    /// Inserts a membership row without deduplication. Callers detect the
    /// duplicate case with `db::errors::is_unique_violation`.
    pub async fn add_member(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: WorkspaceRole,
    ) -> Result<MembershipRecord> {
        self.membership_repo
            .insert_member(InsertMemberParams {
                workspace_id: workspace_id.to_owned(),
                user_id: user_id.to_owned(),
                role,
                created_at: Utc::now().timestamp(),
            })
            .await
    }

    /// Owners first, then admins, then members; ties in join order.
    pub async fn list_members(&self, workspace_id: &str) -> Result<Vec<MemberWithUser>> {
        self.membership_repo
            .list_members_with_users(workspace_id)
            .await
    }

    pub async fn set_role(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: WorkspaceRole,
    ) -> Result<bool> {
        self.membership_repo
            .update_member_role(workspace_id, user_id, role)
            .await
    }

    pub async fn remove_member(&self, workspace_id: &str, user_id: &str) -> Result<bool> {
        self.membership_repo
            .delete_member(workspace_id, user_id)
            .await
    }
}
