use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};
use tracing::debug;

use crate::{
    db::invitation_repo::{AcceptInvitationParams, CreateInvitationParams, InvitationRepository},
    ids::{InvitationId, UserId, WorkspaceId},
    invitation::{InvitationAcceptance, InvitationRecord, InvitationStatus, PendingInvitation},
};

const INVITATION_COLUMNS: &str = "i.id, i.workspace_id, i.email, i.invited_by, i.token, i.status, \
     i.created_at, i.updated_at, i.expires_at, i.accepted_by, i.accepted_at";

pub struct SqliteInvitationRepository {
    pool: Pool<Sqlite>,
}

impl SqliteInvitationRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_invitation_row(row: &SqliteRow) -> Result<InvitationRecord> {
        Ok(InvitationRecord {
            id: InvitationId::from(row.get::<String, _>("id")),
            workspace_id: WorkspaceId::from(row.get::<String, _>("workspace_id")),
            email: row.get("email"),
            invited_by: UserId::from(row.get::<String, _>("invited_by")),
            token: row.get("token"),
            status: row.get::<String, _>("status").parse::<InvitationStatus>()?,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            expires_at: row.get("expires_at"),
            accepted_by: row
                .get::<Option<String>, _>("accepted_by")
                .map(UserId::from),
            accepted_at: row.get("accepted_at"),
        })
    }

    async fn fetch_one_where(
        &self,
        clause: &str,
        binds: &[&str],
    ) -> Result<Option<InvitationRecord>> {
        let sql = format!("SELECT {INVITATION_COLUMNS} FROM workspace_invitations i WHERE {clause}");
        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(*value);
        }

        let row = query.fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::map_invitation_row).transpose()
    }
}

#[async_trait]
impl InvitationRepository for SqliteInvitationRepository {
    async fn insert_invitation(&self, params: CreateInvitationParams) -> Result<InvitationRecord> {
        let CreateInvitationParams {
            id,
            workspace_id,
            email,
            invited_by,
            token,
            created_at,
            expires_at,
        } = params;

        sqlx::query(
            "INSERT INTO workspace_invitations (
                 id,
                 workspace_id,
                 email,
                 invited_by,
                 token,
                 status,
                 created_at,
                 updated_at,
                 expires_at
             ) VALUES (?, ?, ?, ?, ?, 'pending', ?, ?, ?)",
        )
        .bind(&id)
        .bind(&workspace_id)
        .bind(&email)
        .bind(&invited_by)
        .bind(&token)
        .bind(created_at)
        .bind(created_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(InvitationRecord {
            id: InvitationId::from(id),
            workspace_id: WorkspaceId::from(workspace_id),
            email,
            invited_by: UserId::from(invited_by),
            token,
            status: InvitationStatus::Pending,
            created_at,
            updated_at: created_at,
            expires_at,
            accepted_by: None,
            accepted_at: None,
        })
    }

    async fn fetch_invitation_by_token(&self, token: &str) -> Result<Option<InvitationRecord>> {
        self.fetch_one_where("i.token = ?", &[token]).await
    }

    async fn fetch_invitation(
        &self,
        workspace_id: &str,
        invitation_id: &str,
    ) -> Result<Option<InvitationRecord>> {
        self.fetch_one_where("i.workspace_id = ? AND i.id = ?", &[workspace_id, invitation_id])
            .await
    }

    async fn fetch_pending_for_email(
        &self,
        workspace_id: &str,
        email: &str,
    ) -> Result<Option<InvitationRecord>> {
        self.fetch_one_where(
            "i.workspace_id = ? AND i.email = ? AND i.status = 'pending'",
            &[workspace_id, email],
        )
        .await
    }

    async fn delete_invitation(&self, invitation_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM workspace_invitations WHERE id = ?")
            .bind(invitation_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_pending_with_inviter(
        &self,
        workspace_id: &str,
        now: i64,
    ) -> Result<Vec<PendingInvitation>> {
        let sql = format!(
            "SELECT {INVITATION_COLUMNS}, u.name AS inviter_name
             FROM workspace_invitations i
             JOIN users u ON u.id = i.invited_by
             WHERE i.workspace_id = ?
               AND i.status = 'pending'
               AND (i.expires_at IS NULL OR i.expires_at > ?)
             ORDER BY i.created_at DESC, i.rowid DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(workspace_id)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(PendingInvitation {
                    invitation: Self::map_invitation_row(row)?,
                    inviter_name: row.get("inviter_name"),
                })
            })
            .collect()
    }

    async fn accept_invitation(
        &self,
        params: AcceptInvitationParams,
    ) -> Result<InvitationAcceptance> {
        let AcceptInvitationParams {
            invitation_id,
            workspace_id,
            user_id,
            role,
            accepted_at,
        } = params;

        // The membership insert comes first so the transaction takes the write
        // lock before anything is read.
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO workspace_members (workspace_id, user_id, role, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(workspace_id, user_id) DO NOTHING",
        )
        .bind(&workspace_id)
        .bind(&user_id)
        .bind(role.as_str())
        .bind(accepted_at)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        let flipped = sqlx::query(
            "UPDATE workspace_invitations
             SET status = 'accepted', accepted_by = ?, accepted_at = ?, updated_at = ?
             WHERE id = ?
               AND status = 'pending'
               AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(&user_id)
        .bind(accepted_at)
        .bind(accepted_at)
        .bind(&invitation_id)
        .bind(accepted_at)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        let outcome = match (inserted, flipped) {
            (true, true) => InvitationAcceptance::Joined,
            (true, false) => InvitationAcceptance::Superseded,
            (false, _) => InvitationAcceptance::AlreadyMember,
        };

        if outcome == InvitationAcceptance::Superseded {
            debug!(%invitation_id, "invitation no longer pending, rolling back membership");
            tx.rollback().await?;
        } else {
            tx.commit().await?;
        }

        Ok(outcome)
    }
}
