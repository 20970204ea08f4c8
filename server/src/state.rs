use std::sync::Arc;

use taskdeck_core::{
    config::AppConfig, db::Database, invitation::InvitationStore, membership::MembershipStore,
    user::UserStore, workspace::WorkspaceStore,
};
use tracing::info;

use crate::{
    mail::{MailerRef, build_mailer},
    user::service::UserService,
    workspace::{
        invites::InvitationService, members::MembershipService, service::WorkspaceService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub user_store: UserStore,
    pub workspace_store: WorkspaceStore,
    pub membership_store: MembershipStore,
    pub invitation_store: InvitationStore,
    pub user_service: Arc<UserService>,
    pub membership_service: Arc<MembershipService>,
    pub workspace_service: Arc<WorkspaceService>,
    pub invitation_service: Arc<InvitationService>,
    pub base_url: String,
}

pub fn build_state(database: &Database, config: &AppConfig) -> AppState {
    build_state_with_mailer(database, config, build_mailer(&config.mail))
}

pub fn build_state_with_mailer(
    database: &Database,
    config: &AppConfig,
    mailer: MailerRef,
) -> AppState {
    let user_store = UserStore::new(database);
    let workspace_store = WorkspaceStore::new(database);
    let membership_store = MembershipStore::new(database);
    let invitation_store = InvitationStore::new(database);

    let user_service = Arc::new(UserService::new(user_store.clone()));
    let membership_service = Arc::new(MembershipService::new(
        membership_store.clone(),
        workspace_store.clone(),
    ));
    let workspace_service = Arc::new(WorkspaceService::new(
        workspace_store.clone(),
        membership_service.clone(),
    ));
    let invitation_service = Arc::new(InvitationService::new(
        invitation_store.clone(),
        workspace_store.clone(),
        user_store.clone(),
        membership_service.clone(),
        mailer,
        config.mail.timeout(),
        config.invitations.clone(),
        &config.base_url,
    ));

    info!(
        base_url = %config.base_url,
        duplicate_policy = ?config.invitations.duplicate_policy,
        redemption_policy = ?config.invitations.redemption_policy,
        ttl_hours = config.invitations.ttl_hours,
        "application state ready"
    );

    AppState {
        database: database.clone(),
        user_store,
        workspace_store,
        membership_store,
        invitation_store,
        user_service,
        membership_service,
        workspace_service,
        invitation_service,
        base_url: config.base_url.clone(),
    }
}
