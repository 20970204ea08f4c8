use std::sync::Arc;

use axum::extract::FromRef;
use tracing::info;

use taskdeck_core::{
    db::errors::is_unique_violation,
    membership::{MemberWithUser, MembershipRecord, MembershipStore, WorkspaceRole},
    workspace::WorkspaceStore,
};

use crate::{AppError, state::AppState};

pub(crate) const ALREADY_MEMBER: &str = "User is already a member of this workspace";

/// Role predicates and membership mutations. Every predicate is `false` for a
/// workspace that does not exist.
pub struct MembershipService {
    membership_store: MembershipStore,
    workspace_store: WorkspaceStore,
}

impl MembershipService {
    pub fn new(membership_store: MembershipStore, workspace_store: WorkspaceStore) -> Self {
        Self {
            membership_store,
            workspace_store,
        }
    }

    pub async fn find_role(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Option<WorkspaceRole>, AppError> {
        self.membership_store
            .find_role(workspace_id, user_id)
            .await
            .map_err(AppError::from_anyhow)
    }

    pub async fn is_member(&self, workspace_id: &str, user_id: &str) -> Result<bool, AppError> {
        self.membership_store
            .is_member(workspace_id, user_id)
            .await
            .map_err(AppError::from_anyhow)
    }

    pub async fn has_role(
        &self,
        workspace_id: &str,
        user_id: &str,
        allowed: &[WorkspaceRole],
    ) -> Result<bool, AppError> {
        self.membership_store
            .has_role(workspace_id, user_id, allowed)
            .await
            .map_err(AppError::from_anyhow)
    }

    /// Checks `workspaces.owner_id`, not the membership role.
    pub async fn is_owner(&self, workspace_id: &str, user_id: &str) -> Result<bool, AppError> {
        self.workspace_store
            .is_owner(workspace_id, user_id)
            .await
            .map_err(AppError::from_anyhow)
    }

    pub async fn require_member(
        &self,
        workspace_id: &str,
        user_id: &str,
        action: &str,
    ) -> Result<WorkspaceRole, AppError> {
        self.find_role(workspace_id, user_id)
            .await?
            .ok_or_else(|| AppError::permission_denied(workspace_id, action))
    }

    pub async fn require_role(
        &self,
        workspace_id: &str,
        user_id: &str,
        allowed: &[WorkspaceRole],
        action: &str,
    ) -> Result<WorkspaceRole, AppError> {
        match self.find_role(workspace_id, user_id).await? {
            Some(role) if allowed.contains(&role) => Ok(role),
            _ => Err(AppError::permission_denied(workspace_id, action)),
        }
    }

    pub async fn require_owner(
        &self,
        workspace_id: &str,
        user_id: &str,
        action: &str,
    ) -> Result<(), AppError> {
        if self.is_owner(workspace_id, user_id).await? {
            Ok(())
        } else {
            Err(AppError::permission_denied(workspace_id, action))
        }
    }

    /// No deduplication: an existing row surfaces as `Conflict`.
    pub async fn add_member(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: WorkspaceRole,
    ) -> Result<MembershipRecord, AppError> {
        self.membership_store
            .add_member(workspace_id, user_id, role)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    AppError::conflict(ALREADY_MEMBER)
                } else {
                    AppError::from_anyhow(err)
                }
            })
    }

    pub async fn list_members(&self, workspace_id: &str) -> Result<Vec<MemberWithUser>, AppError> {
        self.membership_store
            .list_members(workspace_id)
            .await
            .map_err(AppError::from_anyhow)
    }

    /// `role` is only parsed once the actor is known to be allowed to change
    /// roles.
    pub async fn change_role(
        &self,
        workspace_id: &str,
        actor_id: &str,
        target_user_id: &str,
        role: &str,
    ) -> Result<(), AppError> {
        self.require_role(
            workspace_id,
            actor_id,
            WorkspaceRole::MANAGERS,
            "change member roles",
        )
        .await?;
        let role: WorkspaceRole = role
            .parse()
            .map_err(|_| AppError::validation("Role must be one of admin or member"))?;
        self.apply_role_change(workspace_id, actor_id, target_user_id, role)
            .await
    }

    async fn apply_role_change(
        &self,
        workspace_id: &str,
        actor_id: &str,
        target_user_id: &str,
        role: WorkspaceRole,
    ) -> Result<(), AppError> {
        if role == WorkspaceRole::Owner {
            return Err(AppError::validation("Ownership cannot be transferred"));
        }

        if self.is_owner(workspace_id, target_user_id).await? {
            return Err(AppError::forbidden("The workspace owner's role cannot be changed"));
        }

        let updated = self
            .membership_store
            .set_role(workspace_id, target_user_id, role)
            .await
            .map_err(AppError::from_anyhow)?;

        if !updated {
            return Err(AppError::not_found("Member not found"));
        }

        info!(%workspace_id, %actor_id, %target_user_id, %role, "member role changed");
        Ok(())
    }

    /// Managers may remove anyone but the owner; everyone else may only leave.
    pub async fn remove_member(
        &self,
        workspace_id: &str,
        actor_id: &str,
        target_user_id: &str,
    ) -> Result<(), AppError> {
        let leaving = actor_id == target_user_id;
        if leaving {
            self.require_member(workspace_id, actor_id, "leave this workspace")
                .await?;
        } else {
            self.require_role(
                workspace_id,
                actor_id,
                WorkspaceRole::MANAGERS,
                "remove members",
            )
            .await?;
        }

        if self.is_owner(workspace_id, target_user_id).await? {
            return Err(AppError::forbidden("The workspace owner cannot be removed"));
        }

        let removed = self
            .membership_store
            .remove_member(workspace_id, target_user_id)
            .await
            .map_err(AppError::from_anyhow)?;

        if removed {
            info!(%workspace_id, %actor_id, %target_user_id, leaving, "member removed");
        }
        Ok(())
    }
}

impl FromRef<AppState> for Arc<MembershipService> {
    fn from_ref(state: &AppState) -> Self {
        state.membership_service.clone()
    }
}
