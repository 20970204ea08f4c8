use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::membership_repo::{InsertMemberParams, MembershipRepository},
    ids::{UserId, WorkspaceId},
    membership::{MemberWithUser, MembershipRecord, WorkspaceRole},
};

pub struct SqliteMembershipRepository {
    pool: Pool<Sqlite>,
}

impl SqliteMembershipRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_member_row(row: SqliteRow) -> Result<MembershipRecord> {
        Ok(MembershipRecord {
            workspace_id: WorkspaceId::from(row.get::<String, _>("workspace_id")),
            user_id: UserId::from(row.get::<String, _>("user_id")),
            role: row.get::<String, _>("role").parse()?,
            created_at: row.get("created_at"),
        })
    }

    fn map_member_with_user_row(row: SqliteRow) -> Result<MemberWithUser> {
        Ok(MemberWithUser {
            user_id: UserId::from(row.get::<String, _>("user_id")),
            role: row.get::<String, _>("role").parse()?,
            name: row.get("name"),
            email: row.get("email"),
            image: row.get("image"),
            joined_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl MembershipRepository for SqliteMembershipRepository {
    async fn fetch_member(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Option<MembershipRecord>> {
        let row = sqlx::query(
            "SELECT workspace_id, user_id, role, created_at
             FROM workspace_members
             WHERE workspace_id = ? AND user_id = ?",
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::map_member_row).transpose()
    }

    async fn insert_member(&self, params: InsertMemberParams) -> Result<MembershipRecord> {
        let InsertMemberParams {
            workspace_id,
            user_id,
            role,
            created_at,
        } = params;

        sqlx::query(
            "INSERT INTO workspace_members (workspace_id, user_id, role, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&workspace_id)
        .bind(&user_id)
        .bind(role.as_str())
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(MembershipRecord {
            workspace_id: WorkspaceId::from(workspace_id),
            user_id: UserId::from(user_id),
            role,
            created_at,
        })
    }

    async fn list_members_with_users(&self, workspace_id: &str) -> Result<Vec<MemberWithUser>> {
        let rows = sqlx::query(
            "SELECT
                 wm.user_id,
                 wm.role,
                 wm.created_at,
                 u.name,
                 u.email,
                 u.image
             FROM workspace_members wm
             JOIN users u ON u.id = wm.user_id
             WHERE wm.workspace_id = ?
             ORDER BY
                 CASE wm.role WHEN 'owner' THEN 0 WHEN 'admin' THEN 1 ELSE 2 END,
                 wm.created_at ASC,
                 wm.rowid ASC",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::map_member_with_user_row).collect()
    }

    async fn update_member_role(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: WorkspaceRole,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE workspace_members SET role = ? WHERE workspace_id = ? AND user_id = ?",
        )
        .bind(role.as_str())
        .bind(workspace_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_member(&self, workspace_id: &str, user_id: &str) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM workspace_members WHERE workspace_id = ? AND user_id = ?")
                .bind(workspace_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
