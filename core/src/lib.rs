pub mod config;
pub mod db;
pub mod ids;
pub mod invitation;
pub mod membership;
pub mod user;
pub mod workspace;

#[cfg(test)]
pub(crate) mod test_support;
