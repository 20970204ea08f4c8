pub mod auth;
pub mod cookies;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod http;
pub mod mail;
pub mod observability;
pub mod router;
pub mod state;
pub mod types;
pub mod user;
pub mod utils;
pub mod workspace;

pub use error::AppError;
pub use state::{AppState, build_state, build_state_with_mailer};

#[cfg(test)]
pub mod test_support;
