pub mod invites;
pub mod members;
pub mod service;
