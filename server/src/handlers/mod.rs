// HTTP handlers module structure

pub mod auth_handlers;
pub(crate) mod health_handlers;
pub(crate) mod invitation_handlers;
pub(crate) mod member_handlers;
pub(crate) mod workspace_handlers;
