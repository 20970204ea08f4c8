use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::{
        Database,
        workspace_repo::{CreateWorkspaceParams, WorkspaceRepositoryRef},
    },
    ids::{UserId, WorkspaceId},
    membership::WorkspaceRole,
};

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceRecord {
    pub id: WorkspaceId,
    pub name: String,
    pub owner_id: UserId,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct UserWorkspaceMembership {
    pub workspace: WorkspaceRecord,
    pub role: WorkspaceRole,
    pub joined_at: i64,
    pub member_count: i64,
}

/// A workspace whose `owner`-role memberships are not exactly its canonical
/// owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerInconsistency {
    pub workspace_id: WorkspaceId,
    pub owner_id: UserId,
    pub owner_role_holders: Vec<UserId>,
}

#[derive(Clone)]
pub struct WorkspaceStore {
    workspace_repo: WorkspaceRepositoryRef,
}

impl WorkspaceStore {
    pub fn new(database: &Database) -> Self {
        Self {
            workspace_repo: database.repositories().workspace_repo(),
        }
    }

    /// Creates the workspace and its owner membership atomically. The caller
    /// validates `name`; it is stored trimmed.
    pub async fn create(&self, owner_id: &UserId, name: &str) -> Result<WorkspaceRecord> {
        self.workspace_repo
            .create_workspace(CreateWorkspaceParams {
                id: Uuid::new_v4().to_string(),
                owner_id: owner_id.to_string(),
                name: name.trim().to_owned(),
                created_at: Utc::now().timestamp(),
            })
            .await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<WorkspaceRecord>> {
        self.workspace_repo.fetch_workspace(id).await
    }

    pub async fn list_memberships_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<UserWorkspaceMembership>> {
        self.workspace_repo.list_memberships_for_user(user_id).await
    }

    pub async fn is_owner(&self, workspace_id: &str, user_id: &str) -> Result<bool> {
        Ok(self
            .find_by_id(workspace_id)
            .await?
            .is_some_and(|workspace| workspace.owner_id == user_id))
    }

    pub async fn rename(&self, id: &str, name: &str) -> Result<bool> {
        self.workspace_repo
            .rename_workspace(id, name.trim(), Utc::now().timestamp())
            .await
    }

    /// Deletes the workspace. Members, invitations, tasks and notes go with it.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.workspace_repo.delete_workspace(id).await
    }

    pub async fn find_owner_inconsistencies(&self) -> Result<Vec<OwnerInconsistency>> {
        self.workspace_repo.list_owner_inconsistencies().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        membership::MembershipStore,
        test_support::{seed_user, seed_workspace, setup_database},
    };

    #[tokio::test]
    async fn create_inserts_owner_membership() {
        let (_dir, database) = setup_database().await;
        let owner = seed_user(&database, "owner@example.com").await;
        let store = WorkspaceStore::new(&database);

        let workspace = store
            .create(&owner.id, "  Launch Plan  ")
            .await
            .expect("create workspace");
        assert_eq!(workspace.name, "Launch Plan");
        assert_eq!(workspace.owner_id, owner.id);

        let role = MembershipStore::new(&database)
            .find_role(&workspace.id, &owner.id)
            .await
            .expect("role lookup");
        assert_eq!(role, Some(WorkspaceRole::Owner));
        assert!(store.is_owner(&workspace.id, &owner.id).await.unwrap());
        assert!(store.find_owner_inconsistencies().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memberships_are_listed_newest_first_with_role() {
        let (_dir, database) = setup_database().await;
        let owner = seed_user(&database, "owner@example.com").await;
        let other = seed_user(&database, "other@example.com").await;
        let store = WorkspaceStore::new(&database);

        let first = store.create(&owner.id, "First").await.unwrap();
        let second = store.create(&other.id, "Second").await.unwrap();
        MembershipStore::new(&database)
            .add_member(&second.id, &owner.id, WorkspaceRole::Admin)
            .await
            .unwrap();

        let memberships = store.list_memberships_for_user(&owner.id).await.unwrap();
        let ids: Vec<_> = memberships
            .iter()
            .map(|membership| membership.workspace.id.clone())
            .collect();
        assert_eq!(ids, vec![second.id.clone(), first.id.clone()]);
        assert_eq!(memberships[0].role, WorkspaceRole::Admin);
        assert_eq!(memberships[0].member_count, 2);
        assert_eq!(memberships[1].role, WorkspaceRole::Owner);
    }

    #[tokio::test]
    async fn owner_check_is_false_for_unknown_workspace() {
        let (_dir, database) = setup_database().await;
        let owner = seed_user(&database, "owner@example.com").await;
        let store = WorkspaceStore::new(&database);
        assert!(!store.is_owner("missing", &owner.id).await.unwrap());
    }

    #[tokio::test]
    async fn delete_cascades_to_members_and_content() {
        let (_dir, database) = setup_database().await;
        let owner = seed_user(&database, "owner@example.com").await;
        let workspace = seed_workspace(&database, &owner).await;
        let now = Utc::now().timestamp();

        sqlx::query("INSERT INTO tasks (id, workspace_id, title, created_at) VALUES (?, ?, ?, ?)")
            .bind("task-1")
            .bind(workspace.id.as_str())
            .bind("Write docs")
            .bind(now)
            .execute(database.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO notes (id, workspace_id, title, created_at) VALUES (?, ?, ?, ?)")
            .bind("note-1")
            .bind(workspace.id.as_str())
            .bind("Standup")
            .bind(now)
            .execute(database.pool())
            .await
            .unwrap();

        let store = WorkspaceStore::new(&database);
        assert!(store.delete(&workspace.id).await.unwrap());
        assert!(store.find_by_id(&workspace.id).await.unwrap().is_none());

        for table in ["workspace_members", "tasks", "notes"] {
            let count: i64 = sqlx::query_scalar(&format!(
                "SELECT COUNT(*) FROM {table} WHERE workspace_id = ?"
            ))
            .bind(workspace.id.as_str())
            .fetch_one(database.pool())
            .await
            .unwrap();
            assert_eq!(count, 0, "{table} rows should cascade");
        }
    }

    #[tokio::test]
    async fn owner_inconsistencies_report_drifted_workspaces() {
        let (_dir, database) = setup_database().await;
        let owner = seed_user(&database, "owner@example.com").await;
        let other = seed_user(&database, "other@example.com").await;
        let workspace = seed_workspace(&database, &owner).await;

        sqlx::query("UPDATE workspaces SET owner_id = ? WHERE id = ?")
            .bind(other.id.as_str())
            .bind(workspace.id.as_str())
            .execute(database.pool())
            .await
            .unwrap();

        let drift = WorkspaceStore::new(&database)
            .find_owner_inconsistencies()
            .await
            .unwrap();
        assert_eq!(
            drift,
            vec![OwnerInconsistency {
                workspace_id: workspace.id.clone(),
                owner_id: other.id.clone(),
                owner_role_holders: vec![owner.id.clone()],
            }]
        );
    }
}
