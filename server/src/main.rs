// Taskdeck Server - Main Entry Point
//
// Bootstrap, CLI commands and tracing setup. Routes and business logic live
// in the library crate.

pub use taskdeck_server::*;

use anyhow::{Context, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use dotenvy::{Error as DotenvError, dotenv, from_filename};
use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};
use taskdeck_core::{config::AppConfig, db::Database};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_appender::non_blocking;
use tracing_subscriber::EnvFilter;

static TRACING_GUARD: OnceLock<non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(author, version, about = "Taskdeck server", long_about = None)]
struct Cli {
    /// Path to a TOML config file (defaults to TASKDECK_CONFIG_FILE or taskdeck.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// Run database migrations
    Migrate,
    /// Register a user account
    CreateUser(CreateUserArgs),
    /// Create a workspace owned by an existing user
    CreateWorkspace(CreateWorkspaceArgs),
    /// Report workspaces whose owner and owner-role membership disagree
    CheckOwners,
}

#[derive(Args, Debug)]
struct CreateUserArgs {
    #[arg(long, value_name = "EMAIL")]
    email: String,
    /// Display name
    #[arg(long, value_name = "NAME")]
    name: String,
    #[arg(long, value_name = "PASSWORD")]
    password: String,
}

#[derive(Args, Debug)]
struct CreateWorkspaceArgs {
    /// Owner email (looked up before creation)
    #[arg(long = "owner-email", value_name = "EMAIL")]
    owner_email: String,
    /// Display name for the workspace
    #[arg(long, value_name = "NAME")]
    name: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_status = load_env_file();
    init_tracing();
    report_env_status(&env_status);

    let cli = Cli::parse();
    let config = AppConfig::load_with(cli.config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_serve(config).await,
        Command::Migrate => run_migrate(config).await,
        Command::CreateUser(args) => run_create_user(config, args).await,
        Command::CreateWorkspace(args) => run_create_workspace(config, args).await,
        Command::CheckOwners => run_check_owners(config).await,
    }
}

async fn run_serve(config: AppConfig) -> anyhow::Result<()> {
    info!(
        database_path = %config.database_path,
        database_max_connections = config.database_max_connections,
        mail_provider = ?config.mail.provider,
        "Starting server with database configuration"
    );
    let database = Database::connect(&config).await?;
    let state = build_state(&database, &config);

    let app = router::build_router(state);

    let listener = TcpListener::bind(config.bind_address)
        .await
        .context("failed to bind socket")?;
    let actual_addr = listener
        .local_addr()
        .context("failed to read local address")?;

    info!("listening on {actual_addr}");

    if let Err(error) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(?error, "server terminated with error");
    }

    Ok(())
}

async fn run_migrate(config: AppConfig) -> anyhow::Result<()> {
    let _database = Database::connect(&config).await?;
    info!("migrations completed");
    Ok(())
}

async fn run_create_user(config: AppConfig, args: CreateUserArgs) -> anyhow::Result<()> {
    let database = Database::connect(&config).await?;
    let state = build_state(&database, &config);

    let user = state
        .user_service
        .register_user(args.name.trim(), args.email.trim(), &args.password)
        .await
        .map_err(|err| anyhow!("failed to create user: {}", err.message()))?;

    info!(user_id = %user.id, "created user");
    println!("Created user {} ({})", user.email, user.id);
    Ok(())
}

async fn run_create_workspace(config: AppConfig, args: CreateWorkspaceArgs) -> anyhow::Result<()> {
    let owner_email = args.owner_email.trim();
    if owner_email.is_empty() {
        bail!("owner-email must not be empty");
    }

    let database = Database::connect(&config).await?;
    let state = build_state(&database, &config);

    let owner = state
        .user_service
        .fetch_user_by_email(owner_email)
        .await
        .map_err(|err| anyhow!("failed to look up owner: {}", err.message()))?
        .with_context(|| format!("no user found with email {owner_email}"))?;

    let workspace = state
        .workspace_service
        .create_workspace(&owner, &args.name)
        .await
        .map_err(|err| anyhow!("failed to create workspace: {}", err.message()))?;

    info!(
        workspace_id = %workspace.id,
        owner_id = %workspace.owner_id,
        "created workspace"
    );
    println!(
        "Created workspace '{}' ({}) for owner {}",
        workspace.name, workspace.id, workspace.owner_id
    );

    Ok(())
}

async fn run_check_owners(config: AppConfig) -> anyhow::Result<()> {
    let database = Database::connect(&config).await?;
    let state = build_state(&database, &config);

    let inconsistencies = state
        .workspace_service
        .find_owner_inconsistencies()
        .await
        .map_err(|err| anyhow!("failed to inspect workspaces: {}", err.message()))?;

    if inconsistencies.is_empty() {
        println!("Every workspace has exactly one owner membership matching its owner");
        return Ok(());
    }

    for entry in &inconsistencies {
        warn!(
            workspace_id = %entry.workspace_id,
            owner_id = %entry.owner_id,
            holders = ?entry.owner_role_holders,
            "owner membership mismatch"
        );
        println!(
            "{}: owner {} but owner role held by [{}]",
            entry.workspace_id,
            entry.owner_id,
            entry
                .owner_role_holders
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    bail!(
        "{} workspace(s) have inconsistent ownership",
        inconsistencies.len()
    )
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // TASKDECK_LOG_TO_STDOUT (anything but "0") sends JSON logs to stdout.
    let log_to_stdout = std::env::var("TASKDECK_LOG_TO_STDOUT")
        .map(|v| !v.trim().is_empty() && v.trim() != "0")
        .unwrap_or(false);

    if log_to_stdout
        && tracing_subscriber::fmt()
            .with_env_filter(env_filter.clone())
            .with_ansi(false)
            .json()
            .with_writer(std::io::stdout)
            .try_init()
            .is_ok()
    {
        return;
    }

    let log_dir = std::env::var("TASKDECK_LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    if let Err(err) = std::fs::create_dir_all(&log_dir) {
        eprintln!("failed to create log dir '{log_dir}': {err}");
        std::process::exit(1);
    }
    let file_appender = tracing_appender::rolling::daily(&log_dir, "server.log");
    let (writer, guard) = non_blocking(file_appender);

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .json()
        .with_writer(writer)
        .try_init()
        .is_ok()
    {
        let _ = TRACING_GUARD.set(guard);
    }
}

enum EnvLoadStatus {
    Loaded(PathBuf),
    NotFound,
    Failed(DotenvError),
}

fn load_env_file() -> EnvLoadStatus {
    if let Ok(env_file) = std::env::var("TASKDECK_ENV_FILE") {
        let trimmed = env_file.trim();
        if !trimmed.is_empty() {
            let path = PathBuf::from(trimmed);
            return match from_filename(&path) {
                Ok(_) => EnvLoadStatus::Loaded(make_relative(&path).unwrap_or(path)),
                Err(err) => EnvLoadStatus::Failed(err),
            };
        }
    }

    match dotenv() {
        Ok(path) => EnvLoadStatus::Loaded(make_relative(&path).unwrap_or(path)),
        Err(DotenvError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            EnvLoadStatus::NotFound
        }
        Err(err) => EnvLoadStatus::Failed(err),
    }
}

fn report_env_status(status: &EnvLoadStatus) {
    match status {
        EnvLoadStatus::Loaded(path) => {
            info!("Loaded environment variables from {}", path.display());
        }
        EnvLoadStatus::NotFound => {
            info!("No .env file found; using process environment only");
        }
        EnvLoadStatus::Failed(err) => {
            warn!("Failed to load .env file: {err:?}");
        }
    }
}

fn make_relative(path: &Path) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    path.strip_prefix(&cwd).map(|p| p.to_path_buf()).ok()
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut term), Ok(mut int)) => {
                tokio::select! {
                    _ = term.recv() => {},
                    _ = int.recv() => {},
                }
            }
            _ => {
                warn!("failed to install signal handlers; falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
