// Request and response types for REST API handlers

use serde::{Deserialize, Serialize};

use taskdeck_core::{
    invitation::PendingInvitation,
    membership::{MemberWithUser, WorkspaceRole},
    user::{UserProfile, UserRecord},
    workspace::{UserWorkspaceMembership, WorkspaceRecord},
};

use crate::workspace::invites::{InvitationCreated, RedemptionOutcome, RedemptionStatus};

// ========== Authentication Types ==========

/// The caller resolved from a session cookie or bearer token.
#[derive(Debug)]
pub(crate) struct AuthenticatedCaller {
    pub(crate) user: UserRecord,
    pub(crate) set_cookies: Vec<String>,
}

#[derive(Debug)]
pub(crate) struct SessionLookup {
    pub(crate) user: Option<UserProfile>,
    pub(crate) cookies: Vec<String>,
}

// ========== Request Types ==========

#[derive(Deserialize)]
pub(crate) struct RegisterRequest {
    #[serde(default)]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) email: String,
    #[serde(default)]
    pub(crate) password: String,
}

#[derive(Deserialize)]
pub(crate) struct SignInRequest {
    pub(crate) email: String,
    pub(crate) password: String,
}

#[derive(Deserialize)]
pub(crate) struct WorkspaceNameRequest {
    #[serde(default)]
    pub(crate) name: String,
}

#[derive(Deserialize)]
pub(crate) struct ChangeRoleRequest {
    pub(crate) role: String,
}

#[derive(Deserialize)]
pub(crate) struct CreateInvitationRequest {
    #[serde(default)]
    pub(crate) email: String,
}

#[derive(Deserialize)]
pub(crate) struct RedeemInvitationRequest {
    #[serde(default)]
    pub(crate) token: String,
}

// ========== Response Types ==========

#[derive(Serialize)]
pub(crate) struct SuccessResponse {
    pub(crate) success: bool,
}

impl SuccessResponse {
    pub(crate) fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Serialize)]
pub(crate) struct UserResponse {
    pub(crate) user: UserProfile,
}

impl From<&UserRecord> for UserResponse {
    fn from(record: &UserRecord) -> Self {
        Self {
            user: UserProfile::from(record),
        }
    }
}

#[derive(Serialize)]
pub(crate) struct SessionResponse {
    pub(crate) user: Option<UserProfile>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorkspaceResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) owner_id: String,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}

impl From<&WorkspaceRecord> for WorkspaceResponse {
    fn from(record: &WorkspaceRecord) -> Self {
        Self {
            id: record.id.to_string(),
            name: record.name.clone(),
            owner_id: record.owner_id.to_string(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorkspaceSummaryResponse {
    #[serde(flatten)]
    pub(crate) workspace: WorkspaceResponse,
    pub(crate) role: WorkspaceRole,
    pub(crate) member_count: i64,
    pub(crate) joined_at: i64,
}

impl From<&UserWorkspaceMembership> for WorkspaceSummaryResponse {
    fn from(membership: &UserWorkspaceMembership) -> Self {
        Self {
            workspace: WorkspaceResponse::from(&membership.workspace),
            role: membership.role,
            member_count: membership.member_count,
            joined_at: membership.joined_at,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct WorkspaceListResponse {
    pub(crate) workspaces: Vec<WorkspaceSummaryResponse>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MemberResponse {
    pub(crate) user_id: String,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) image: Option<String>,
    pub(crate) role: WorkspaceRole,
    pub(crate) joined_at: i64,
}

impl From<&MemberWithUser> for MemberResponse {
    fn from(member: &MemberWithUser) -> Self {
        Self {
            user_id: member.user_id.to_string(),
            name: member.name.clone(),
            email: member.email.clone(),
            image: member.image.clone(),
            role: member.role,
            joined_at: member.joined_at,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct WorkspaceDetailsResponse {
    pub(crate) workspace: WorkspaceResponse,
    pub(crate) role: WorkspaceRole,
    pub(crate) members: Vec<MemberResponse>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InvitationResponse {
    pub(crate) id: String,
    pub(crate) workspace_id: String,
    pub(crate) email: String,
    pub(crate) invited_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) inviter_name: Option<String>,
    pub(crate) status: String,
    pub(crate) created_at: i64,
    pub(crate) expires_at: Option<i64>,
}

impl From<&PendingInvitation> for InvitationResponse {
    fn from(entry: &PendingInvitation) -> Self {
        let invitation = &entry.invitation;
        Self {
            id: invitation.id.to_string(),
            workspace_id: invitation.workspace_id.to_string(),
            email: invitation.email.clone(),
            invited_by: invitation.invited_by.to_string(),
            inviter_name: Some(entry.inviter_name.clone()),
            status: invitation.status.to_string(),
            created_at: invitation.created_at,
            expires_at: invitation.expires_at,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct InvitationListResponse {
    pub(crate) invitations: Vec<InvitationResponse>,
}

/// The token itself is never echoed; it only travels inside `link`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InvitationCreatedResponse {
    pub(crate) invitation: InvitationResponse,
    pub(crate) link: String,
    pub(crate) reused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) mail_warning: Option<String>,
}

impl From<&InvitationCreated> for InvitationCreatedResponse {
    fn from(created: &InvitationCreated) -> Self {
        let invitation = &created.invitation;
        Self {
            invitation: InvitationResponse {
                id: invitation.id.to_string(),
                workspace_id: invitation.workspace_id.to_string(),
                email: invitation.email.clone(),
                invited_by: invitation.invited_by.to_string(),
                inviter_name: None,
                status: invitation.status.to_string(),
                created_at: invitation.created_at,
                expires_at: invitation.expires_at,
            },
            link: created.link.clone(),
            reused: created.reused,
            mail_warning: created.mail_warning.clone(),
        }
    }
}

#[derive(Serialize)]
pub(crate) struct WorkspaceRef {
    pub(crate) id: String,
    pub(crate) name: String,
}

#[derive(Serialize)]
pub(crate) struct RedemptionResponse {
    pub(crate) status: RedemptionStatus,
    pub(crate) workspace: WorkspaceRef,
}

impl From<&RedemptionOutcome> for RedemptionResponse {
    fn from(outcome: &RedemptionOutcome) -> Self {
        Self {
            status: outcome.status,
            workspace: WorkspaceRef {
                id: outcome.workspace.id.to_string(),
                name: outcome.workspace.name.clone(),
            },
        }
    }
}

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
}
