use std::{fs, fs::File, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use sqlx::{Pool, Sqlite};

use self::{
    invitation_repo::InvitationRepositoryRef,
    membership_repo::MembershipRepositoryRef,
    sqlite::{
        connection as sqlite_connection, invitation_repo::SqliteInvitationRepository,
        membership_repo::SqliteMembershipRepository, user_repo::SqliteUserRepository,
        workspace_repo::SqliteWorkspaceRepository,
    },
    user_repo::UserRepositoryRef,
    workspace_repo::WorkspaceRepositoryRef,
};
use crate::config::AppConfig;

pub mod errors;
pub mod invitation_repo;
pub mod membership_repo;
pub mod sqlite;
pub mod user_repo;
pub mod workspace_repo;

#[derive(Clone)]
pub struct RepositoryRegistry {
    user_repo: UserRepositoryRef,
    workspace_repo: WorkspaceRepositoryRef,
    membership_repo: MembershipRepositoryRef,
    invitation_repo: InvitationRepositoryRef,
}

impl RepositoryRegistry {
    pub fn new(
        user_repo: UserRepositoryRef,
        workspace_repo: WorkspaceRepositoryRef,
        membership_repo: MembershipRepositoryRef,
        invitation_repo: InvitationRepositoryRef,
    ) -> Self {
        Self {
            user_repo,
            workspace_repo,
            membership_repo,
            invitation_repo,
        }
    }

    fn sqlite(pool: &Pool<Sqlite>) -> Self {
        Self::new(
            Arc::new(SqliteUserRepository::new(pool.clone())),
            Arc::new(SqliteWorkspaceRepository::new(pool.clone())),
            Arc::new(SqliteMembershipRepository::new(pool.clone())),
            Arc::new(SqliteInvitationRepository::new(pool.clone())),
        )
    }

    pub fn user_repo(&self) -> UserRepositoryRef {
        self.user_repo.clone()
    }

    pub fn workspace_repo(&self) -> WorkspaceRepositoryRef {
        self.workspace_repo.clone()
    }

    pub fn membership_repo(&self) -> MembershipRepositoryRef {
        self.membership_repo.clone()
    }

    pub fn invitation_repo(&self) -> InvitationRepositoryRef {
        self.invitation_repo.clone()
    }
}

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
    path: PathBuf,
    repositories: Arc<RepositoryRegistry>,
}

impl Database {
    /// Opens (creating if needed) the SQLite file named by the config and
    /// applies pending migrations.
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let path = Self::resolve_db_path(&config.database_path)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory: {}", parent.display())
            })?;
        }

        if !path.exists() {
            File::create(&path)
                .with_context(|| format!("failed to create database file: {}", path.display()))?;
        }

        let pool = sqlite_connection::create_pool(&path, config.database_max_connections).await?;
        sqlite_connection::run_migrations(&pool).await?;

        let repositories = Arc::new(RepositoryRegistry::sqlite(&pool));

        tracing::debug!(path = %path.display(), "database ready");

        Ok(Self {
            pool,
            path,
            repositories,
        })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub fn database_path(&self) -> &PathBuf {
        &self.path
    }

    pub fn repositories(&self) -> &RepositoryRegistry {
        &self.repositories
    }

    fn resolve_db_path(path: &str) -> Result<PathBuf> {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            Ok(path)
        } else {
            let cwd = std::env::current_dir().context("failed to obtain current directory")?;
            Ok(cwd.join(path))
        }
    }
}
