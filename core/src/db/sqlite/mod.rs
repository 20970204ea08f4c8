pub mod connection;
pub mod invitation_repo;
pub mod membership_repo;
pub mod user_repo;
pub mod workspace_repo;
