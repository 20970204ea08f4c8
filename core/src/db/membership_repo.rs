use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::membership::{MemberWithUser, MembershipRecord, WorkspaceRole};

#[derive(Debug, Clone)]
pub struct InsertMemberParams {
    pub workspace_id: String,
    pub user_id: String,
    pub role: WorkspaceRole,
    pub created_at: i64,
}

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn fetch_member(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Option<MembershipRecord>>;

    /// Plain insert. A second row for the same pair fails with a unique violation.
    async fn insert_member(&self, params: InsertMemberParams) -> Result<MembershipRecord>;

    async fn list_members_with_users(&self, workspace_id: &str) -> Result<Vec<MemberWithUser>>;

    async fn update_member_role(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: WorkspaceRole,
    ) -> Result<bool>;

    async fn delete_member(&self, workspace_id: &str, user_id: &str) -> Result<bool>;
}

pub type MembershipRepositoryRef = Arc<dyn MembershipRepository>;
