use std::{sync::Arc, time::Duration};

use axum::extract::FromRef;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use taskdeck_core::{
    config::{DuplicateInvitePolicy, InvitationConfig, RedemptionPolicy},
    db::errors::is_unique_violation,
    invitation::{
        InvitationAcceptance, InvitationRecord, InvitationStatus, InvitationStore,
        PendingInvitation,
    },
    membership::WorkspaceRole,
    user::{UserRecord, UserStore, normalize_email},
    workspace::{WorkspaceRecord, WorkspaceStore},
};

use crate::{
    AppError,
    crypto::generate_invitation_token,
    mail::{InvitationMail, MailerRef},
    state::AppState,
    utils::users::is_valid_email,
    workspace::members::{ALREADY_MEMBER, MembershipService},
};

const ALREADY_INVITED: &str = "Invitation already sent to this email";
const MAIL_WARNING: &str = "Invitation created, but the email could not be sent";

#[derive(Debug, Clone)]
pub struct InvitationCreated {
    pub invitation: InvitationRecord,
    pub link: String,
    /// `true` when an existing pending invitation was handed back.
    pub reused: bool,
    pub mail_warning: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionStatus {
    Joined,
    AlreadyMember,
}

#[derive(Debug, Clone)]
pub struct RedemptionOutcome {
    pub status: RedemptionStatus,
    pub workspace: WorkspaceRecord,
}

/// What a token resolves to before any write happens.
enum InvitationLookup {
    Active(InvitationRecord),
    Missing,
    Consumed,
    Expired,
}

pub struct InvitationService {
    invitation_store: InvitationStore,
    workspace_store: WorkspaceStore,
    user_store: UserStore,
    members: Arc<MembershipService>,
    mailer: MailerRef,
    mail_timeout: Duration,
    config: InvitationConfig,
    base_url: String,
}

impl InvitationService {
    pub fn new(
        invitation_store: InvitationStore,
        workspace_store: WorkspaceStore,
        user_store: UserStore,
        members: Arc<MembershipService>,
        mailer: MailerRef,
        mail_timeout: Duration,
        config: InvitationConfig,
        base_url: &str,
    ) -> Self {
        Self {
            invitation_store,
            workspace_store,
            user_store,
            members,
            mailer,
            mail_timeout,
            config,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    pub fn invitation_link(&self, token: &str) -> String {
        format!("{}/invite?token={token}", self.base_url)
    }

    pub async fn create_invitation(
        &self,
        workspace_id: &str,
        inviter: &UserRecord,
        email: &str,
    ) -> Result<InvitationCreated, AppError> {
        if !is_valid_email(email) {
            return Err(AppError::validation("Invalid email address"));
        }
        let email = normalize_email(email);

        self.members
            .require_role(
                workspace_id,
                &inviter.id,
                WorkspaceRole::MANAGERS,
                "invite members",
            )
            .await?;

        let workspace = self
            .workspace_store
            .find_by_id(workspace_id)
            .await
            .map_err(AppError::from_anyhow)?
            .ok_or_else(|| AppError::workspace_not_found(workspace_id))?;

        if let Some(existing) = self.live_pending_invitation(workspace_id, &email).await? {
            return self.apply_duplicate_policy(existing);
        }

        if let Some(invitee) = self
            .user_store
            .find_by_email(&email)
            .await
            .map_err(AppError::from_anyhow)?
        {
            if self.members.is_member(workspace_id, &invitee.id).await? {
                return Err(AppError::conflict(ALREADY_MEMBER));
            }
        }

        let token = generate_invitation_token();
        let invitation = match self
            .invitation_store
            .create(
                workspace_id,
                &email,
                &inviter.id,
                &token,
                self.config.ttl_seconds(),
            )
            .await
        {
            Ok(invitation) => invitation,
            Err(err) if is_unique_violation(&err) => {
                // Another request inserted the pending row after our check.
                let existing = self
                    .invitation_store
                    .find_pending_for_email(workspace_id, &email)
                    .await
                    .map_err(AppError::from_anyhow)?
                    .ok_or_else(|| AppError::conflict(ALREADY_INVITED))?;
                return self.apply_duplicate_policy(existing);
            }
            Err(err) => return Err(AppError::from_anyhow(err)),
        };

        info!(
            %workspace_id,
            invitation_id = %invitation.id,
            inviter_id = %inviter.id,
            "invitation created"
        );

        let link = self.invitation_link(&invitation.token);
        let mail = InvitationMail {
            to: invitation.email.clone(),
            inviter_name: inviter.name.clone(),
            workspace_name: workspace.name.clone(),
            link: link.clone(),
        };
        let mail_warning =
            match tokio::time::timeout(self.mail_timeout, self.mailer.send_invitation(&mail)).await
            {
                Ok(Ok(())) => None,
                Ok(Err(error)) => {
                    warn!(
                        ?error,
                        invitation_id = %invitation.id,
                        "invitation mail could not be sent"
                    );
                    Some(MAIL_WARNING.to_owned())
                }
                Err(_) => {
                    warn!(
                        invitation_id = %invitation.id,
                        timeout_ms = self.mail_timeout.as_millis() as u64,
                        "invitation mail timed out"
                    );
                    Some(MAIL_WARNING.to_owned())
                }
            };

        Ok(InvitationCreated {
            invitation,
            link,
            reused: false,
            mail_warning,
        })
    }

    pub async fn redeem_invitation(
        &self,
        token: &str,
        caller: &UserRecord,
    ) -> Result<RedemptionOutcome, AppError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::validation("Invitation token is required"));
        }

        let invitation = match self.lookup(token).await? {
            InvitationLookup::Active(invitation) => invitation,
            InvitationLookup::Missing | InvitationLookup::Consumed | InvitationLookup::Expired => {
                return Err(AppError::invalid_invitation());
            }
        };

        if self.config.redemption_policy == RedemptionPolicy::MatchEmail
            && normalize_email(&caller.email) != invitation.email
        {
            return Err(AppError::forbidden(
                "This invitation was sent to a different email address",
            ));
        }

        let workspace = self
            .workspace_store
            .find_by_id(&invitation.workspace_id)
            .await
            .map_err(AppError::from_anyhow)?
            .ok_or_else(AppError::invalid_invitation)?;

        let acceptance = self
            .invitation_store
            .accept(&invitation, &caller.id)
            .await
            .map_err(AppError::from_anyhow)?;

        let status = match acceptance {
            InvitationAcceptance::Joined => RedemptionStatus::Joined,
            InvitationAcceptance::AlreadyMember => RedemptionStatus::AlreadyMember,
            InvitationAcceptance::Superseded => return Err(AppError::invalid_invitation()),
        };

        info!(
            workspace_id = %workspace.id,
            invitation_id = %invitation.id,
            user_id = %caller.id,
            ?status,
            "invitation redeemed"
        );

        Ok(RedemptionOutcome { status, workspace })
    }

    pub async fn list_pending_invitations(
        &self,
        workspace_id: &str,
        caller: &UserRecord,
    ) -> Result<Vec<PendingInvitation>, AppError> {
        self.members
            .require_member(workspace_id, &caller.id, "view invitations")
            .await?;

        self.invitation_store
            .list_pending(workspace_id)
            .await
            .map_err(AppError::from_anyhow)
    }

    pub async fn revoke_invitation(
        &self,
        workspace_id: &str,
        caller: &UserRecord,
        invitation_id: &str,
    ) -> Result<(), AppError> {
        self.members
            .require_role(
                workspace_id,
                &caller.id,
                WorkspaceRole::MANAGERS,
                "revoke invitations",
            )
            .await?;

        let invitation = self
            .invitation_store
            .find_in_workspace(workspace_id, invitation_id)
            .await
            .map_err(AppError::from_anyhow)?
            .filter(|invitation| invitation.status == InvitationStatus::Pending)
            .ok_or_else(|| AppError::not_found("Invitation not found"))?;

        self.invitation_store
            .delete(&invitation.id)
            .await
            .map_err(AppError::from_anyhow)?;

        info!(%workspace_id, %invitation_id, actor_id = %caller.id, "invitation revoked");
        Ok(())
    }

    /// The unexpired pending invitation for the pair. An expired one is
    /// deleted so the pending index does not block a fresh invite.
    async fn live_pending_invitation(
        &self,
        workspace_id: &str,
        email: &str,
    ) -> Result<Option<InvitationRecord>, AppError> {
        let Some(existing) = self
            .invitation_store
            .find_pending_for_email(workspace_id, email)
            .await
            .map_err(AppError::from_anyhow)?
        else {
            return Ok(None);
        };

        if existing.is_expired(Utc::now().timestamp()) {
            debug!(invitation_id = %existing.id, "removing expired invitation");
            self.invitation_store
                .delete(&existing.id)
                .await
                .map_err(AppError::from_anyhow)?;
            return Ok(None);
        }

        Ok(Some(existing))
    }

    fn apply_duplicate_policy(
        &self,
        existing: InvitationRecord,
    ) -> Result<InvitationCreated, AppError> {
        match self.config.duplicate_policy {
            DuplicateInvitePolicy::Reject => Err(AppError::conflict(ALREADY_INVITED)),
            DuplicateInvitePolicy::Reuse => Ok(InvitationCreated {
                link: self.invitation_link(&existing.token),
                invitation: existing,
                reused: true,
                mail_warning: None,
            }),
        }
    }

    async fn lookup(&self, token: &str) -> Result<InvitationLookup, AppError> {
        let Some(invitation) = self
            .invitation_store
            .find_by_token(token)
            .await
            .map_err(AppError::from_anyhow)?
        else {
            return Ok(InvitationLookup::Missing);
        };

        if invitation.status != InvitationStatus::Pending {
            return Ok(InvitationLookup::Consumed);
        }

        if invitation.is_expired(Utc::now().timestamp()) {
            self.invitation_store
                .delete(&invitation.id)
                .await
                .map_err(AppError::from_anyhow)?;
            return Ok(InvitationLookup::Expired);
        }

        Ok(InvitationLookup::Active(invitation))
    }
}

impl FromRef<AppState> for Arc<InvitationService> {
    fn from_ref(state: &AppState) -> Self {
        state.invitation_service.clone()
    }
}
