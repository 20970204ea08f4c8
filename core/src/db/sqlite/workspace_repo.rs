use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::workspace_repo::{CreateWorkspaceParams, WorkspaceRepository},
    ids::{UserId, WorkspaceId},
    membership::WorkspaceRole,
    workspace::{OwnerInconsistency, UserWorkspaceMembership, WorkspaceRecord},
};

pub struct SqliteWorkspaceRepository {
    pool: Pool<Sqlite>,
}

impl SqliteWorkspaceRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_workspace_row(row: &SqliteRow) -> WorkspaceRecord {
        WorkspaceRecord {
            id: WorkspaceId::from(row.get::<String, _>("id")),
            name: row.get("name"),
            owner_id: UserId::from(row.get::<String, _>("owner_id")),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    fn map_membership_row(row: SqliteRow) -> Result<UserWorkspaceMembership> {
        Ok(UserWorkspaceMembership {
            workspace: Self::map_workspace_row(&row),
            role: row.get::<String, _>("role").parse::<WorkspaceRole>()?,
            joined_at: row.get("joined_at"),
            member_count: row.get("member_count"),
        })
    }
}

#[async_trait]
impl WorkspaceRepository for SqliteWorkspaceRepository {
    async fn create_workspace(&self, params: CreateWorkspaceParams) -> Result<WorkspaceRecord> {
        let CreateWorkspaceParams {
            id,
            owner_id,
            name,
            created_at,
        } = params;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO workspaces (id, name, owner_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&name)
        .bind(&owner_id)
        .bind(created_at)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO workspace_members (workspace_id, user_id, role, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&owner_id)
        .bind(WorkspaceRole::Owner.as_str())
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(WorkspaceRecord {
            id: WorkspaceId::from(id),
            name,
            owner_id: UserId::from(owner_id),
            created_at,
            updated_at: created_at,
        })
    }

    async fn fetch_workspace(&self, id: &str) -> Result<Option<WorkspaceRecord>> {
        let row = sqlx::query(
            "SELECT id, name, owner_id, created_at, updated_at
             FROM workspaces
             WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::map_workspace_row))
    }

    async fn list_memberships_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<UserWorkspaceMembership>> {
        let rows = sqlx::query(
            "SELECT
                 w.id,
                 w.name,
                 w.owner_id,
                 w.created_at,
                 w.updated_at,
                 wm.role,
                 wm.created_at AS joined_at,
                 (SELECT COUNT(*) FROM workspace_members c WHERE c.workspace_id = w.id)
                     AS member_count
             FROM workspace_members wm
             JOIN workspaces w ON w.id = wm.workspace_id
             WHERE wm.user_id = ?
             ORDER BY w.created_at DESC, w.rowid DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::map_membership_row).collect()
    }

    async fn rename_workspace(&self, id: &str, name: &str, updated_at: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE workspaces SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(updated_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_workspace(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM workspaces WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_owner_inconsistencies(&self) -> Result<Vec<OwnerInconsistency>> {
        let rows = sqlx::query(
            "SELECT
                 w.id,
                 w.owner_id,
                 (SELECT GROUP_CONCAT(m.user_id, ',')
                    FROM workspace_members m
                   WHERE m.workspace_id = w.id AND m.role = 'owner') AS owner_members
             FROM workspaces w
             WHERE (SELECT COUNT(*)
                      FROM workspace_members m
                     WHERE m.workspace_id = w.id AND m.role = 'owner') <> 1
                OR NOT EXISTS (
                       SELECT 1
                         FROM workspace_members m
                        WHERE m.workspace_id = w.id
                          AND m.user_id = w.owner_id
                          AND m.role = 'owner'
                   )
             ORDER BY w.created_at ASC, w.rowid ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let owner_members: Option<String> = row.get("owner_members");
                OwnerInconsistency {
                    workspace_id: WorkspaceId::from(row.get::<String, _>("id")),
                    owner_id: UserId::from(row.get::<String, _>("owner_id")),
                    owner_role_holders: owner_members
                        .unwrap_or_default()
                        .split(',')
                        .filter(|value| !value.is_empty())
                        .map(UserId::from)
                        .collect(),
                }
            })
            .collect())
    }
}
