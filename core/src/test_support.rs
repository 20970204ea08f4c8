use tempfile::TempDir;

use crate::{
    config::AppConfig,
    db::Database,
    membership::WorkspaceRole,
    user::{UserRecord, UserStore},
    workspace::{WorkspaceRecord, WorkspaceStore},
};

pub(crate) async fn setup_database() -> (TempDir, Database) {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let mut config = AppConfig::default();
    config.database_path = temp_dir
        .path()
        .join("core-test.db")
        .to_string_lossy()
        .into_owned();

    let database = Database::connect(&config).await.expect("connect database");
    (temp_dir, database)
}

pub(crate) async fn seed_user(database: &Database, email: &str) -> UserRecord {
    let name = email.split('@').next().unwrap_or("user");
    UserStore::new(database)
        .create(email, name, "not-a-real-hash")
        .await
        .expect("create user")
}

pub(crate) async fn seed_workspace(database: &Database, owner: &UserRecord) -> WorkspaceRecord {
    WorkspaceStore::new(database)
        .create(&owner.id, "Seeded Workspace")
        .await
        .expect("create workspace")
}

pub(crate) async fn seed_member(
    database: &Database,
    workspace: &WorkspaceRecord,
    email: &str,
    role: WorkspaceRole,
) -> UserRecord {
    let user = seed_user(database, email).await;
    crate::membership::MembershipStore::new(database)
        .add_member(&workspace.id, &user.id, role)
        .await
        .expect("add member");
    user
}
