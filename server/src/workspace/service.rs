use std::sync::Arc;

use axum::extract::FromRef;
use tracing::info;

use taskdeck_core::{
    membership::{MemberWithUser, WorkspaceRole},
    user::UserRecord,
    workspace::{OwnerInconsistency, UserWorkspaceMembership, WorkspaceRecord, WorkspaceStore},
};

use crate::{AppError, state::AppState, workspace::members::MembershipService};

#[derive(Debug)]
pub struct WorkspaceDetails {
    pub workspace: WorkspaceRecord,
    pub role: WorkspaceRole,
    pub members: Vec<MemberWithUser>,
}

pub struct WorkspaceService {
    workspace_store: WorkspaceStore,
    members: Arc<MembershipService>,
}

impl WorkspaceService {
    pub fn new(workspace_store: WorkspaceStore, members: Arc<MembershipService>) -> Self {
        Self {
            workspace_store,
            members,
        }
    }

    pub async fn fetch_workspace(&self, workspace_id: &str) -> Result<WorkspaceRecord, AppError> {
        self.workspace_store
            .find_by_id(workspace_id)
            .await
            .map_err(AppError::from_anyhow)?
            .ok_or_else(|| AppError::workspace_not_found(workspace_id))
    }

    pub async fn create_workspace(
        &self,
        caller: &UserRecord,
        name: &str,
    ) -> Result<WorkspaceRecord, AppError> {
        let name = validate_workspace_name(name)?;
        let workspace = self
            .workspace_store
            .create(&caller.id, name)
            .await
            .map_err(AppError::from_anyhow)?;

        info!(workspace_id = %workspace.id, owner_id = %caller.id, "workspace created");
        Ok(workspace)
    }

    pub async fn list_workspaces(
        &self,
        caller: &UserRecord,
    ) -> Result<Vec<UserWorkspaceMembership>, AppError> {
        self.workspace_store
            .list_memberships_for_user(&caller.id)
            .await
            .map_err(AppError::from_anyhow)
    }

    pub async fn get_workspace(
        &self,
        workspace_id: &str,
        caller: &UserRecord,
    ) -> Result<WorkspaceDetails, AppError> {
        let role = self
            .members
            .require_member(workspace_id, &caller.id, "view this workspace")
            .await?;
        let workspace = self.fetch_workspace(workspace_id).await?;
        let members = self.members.list_members(workspace_id).await?;

        Ok(WorkspaceDetails {
            workspace,
            role,
            members,
        })
    }

    pub async fn rename_workspace(
        &self,
        workspace_id: &str,
        caller: &UserRecord,
        name: &str,
    ) -> Result<WorkspaceRecord, AppError> {
        self.members
            .require_role(
                workspace_id,
                &caller.id,
                WorkspaceRole::MANAGERS,
                "rename this workspace",
            )
            .await?;
        let name = validate_workspace_name(name)?;

        let renamed = self
            .workspace_store
            .rename(workspace_id, name)
            .await
            .map_err(AppError::from_anyhow)?;
        if !renamed {
            return Err(AppError::workspace_not_found(workspace_id));
        }

        info!(%workspace_id, actor_id = %caller.id, "workspace renamed");
        self.fetch_workspace(workspace_id).await
    }

    /// Members, invitations, tasks and notes are removed with the workspace.
    pub async fn delete_workspace(
        &self,
        workspace_id: &str,
        caller: &UserRecord,
    ) -> Result<(), AppError> {
        self.members
            .require_owner(workspace_id, &caller.id, "delete this workspace")
            .await?;

        let deleted = self
            .workspace_store
            .delete(workspace_id)
            .await
            .map_err(AppError::from_anyhow)?;
        if !deleted {
            return Err(AppError::workspace_not_found(workspace_id));
        }

        info!(%workspace_id, owner_id = %caller.id, "workspace deleted");
        Ok(())
    }

    pub async fn find_owner_inconsistencies(&self) -> Result<Vec<OwnerInconsistency>, AppError> {
        self.workspace_store
            .find_owner_inconsistencies()
            .await
            .map_err(AppError::from_anyhow)
    }
}

fn validate_workspace_name(name: &str) -> Result<&str, AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(AppError::validation("Workspace name is required"))
    } else {
        Ok(trimmed)
    }
}

impl FromRef<AppState> for Arc<WorkspaceService> {
    fn from_ref(state: &AppState) -> Self {
        state.workspace_service.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_member, seed_user, seed_workspace, setup_state};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn creator_becomes_the_sole_owner() {
        let (_dir, state) = setup_state().await;
        let owner = seed_user(&state, "owner@example.com").await;
        let service = &state.workspace_service;

        let err = service.create_workspace(&owner, "   ").await.unwrap_err();
        assert_eq!(err.message(), "Workspace name is required");

        let workspace = service.create_workspace(&owner, " Acme ").await.unwrap();
        assert_eq!(workspace.name, "Acme");

        let details = service.get_workspace(&workspace.id, &owner).await.unwrap();
        assert_eq!(details.role, WorkspaceRole::Owner);
        assert_eq!(details.members.len(), 1);
        assert_eq!(details.members[0].user_id, owner.id);
        assert_eq!(details.members[0].role, WorkspaceRole::Owner);
    }

    #[tokio::test]
    async fn outsiders_cannot_rename_or_view() {
        let (_dir, state) = setup_state().await;
        let owner = seed_user(&state, "owner@example.com").await;
        let outsider = seed_user(&state, "outsider@example.com").await;
        let workspace = seed_workspace(&state, &owner, "Acme").await;
        let service = &state.workspace_service;

        let err = service
            .rename_workspace(&workspace.id, &outsider, "Hijacked")
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let err = service
            .get_workspace(&workspace.id, &outsider)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        // An unknown workspace looks the same as one the caller cannot see.
        let err = service
            .rename_workspace("missing", &outsider, "Anything")
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admins_rename_but_only_the_owner_deletes() {
        let (_dir, state) = setup_state().await;
        let owner = seed_user(&state, "owner@example.com").await;
        let workspace = seed_workspace(&state, &owner, "Acme").await;
        let admin = seed_member(&state, &workspace, "admin@example.com", WorkspaceRole::Admin).await;
        let service = &state.workspace_service;

        let renamed = service
            .rename_workspace(&workspace.id, &admin, "Acme Labs")
            .await
            .unwrap();
        assert_eq!(renamed.name, "Acme Labs");

        let err = service
            .delete_workspace(&workspace.id, &admin)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        service.delete_workspace(&workspace.id, &owner).await.unwrap();
        let err = service.fetch_workspace(&workspace.id).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(service.list_workspaces(&admin).await.unwrap().is_empty());
    }
}
