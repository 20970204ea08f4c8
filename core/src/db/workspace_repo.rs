use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::workspace::{OwnerInconsistency, UserWorkspaceMembership, WorkspaceRecord};

#[derive(Debug, Clone)]
pub struct CreateWorkspaceParams {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub created_at: i64,
}

#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    /// Inserts the workspace together with the owner's membership row.
    async fn create_workspace(&self, params: CreateWorkspaceParams) -> Result<WorkspaceRecord>;

    async fn fetch_workspace(&self, id: &str) -> Result<Option<WorkspaceRecord>>;

    async fn list_memberships_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<UserWorkspaceMembership>>;

    async fn rename_workspace(&self, id: &str, name: &str, updated_at: i64) -> Result<bool>;

    async fn delete_workspace(&self, id: &str) -> Result<bool>;

    async fn list_owner_inconsistencies(&self) -> Result<Vec<OwnerInconsistency>>;
}

pub type WorkspaceRepositoryRef = Arc<dyn WorkspaceRepository>;
