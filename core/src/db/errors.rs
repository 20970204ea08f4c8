use anyhow::Error as AnyError;
use sqlx::{Error as SqlxError, error::DatabaseError};
use std::error::Error as StdError;

const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";
const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";

/// Returns `true` if any cause in the error chain is a uniqueness constraint
/// violation reported by SQLite.
pub fn is_unique_violation(err: &AnyError) -> bool {
    err.chain().any(is_unique_violation_cause)
}

fn is_unique_violation_cause(cause: &(dyn StdError + 'static)) -> bool {
    match cause.downcast_ref::<SqlxError>() {
        Some(SqlxError::Database(db_err)) => database_error_is_unique(db_err.as_ref()),
        Some(_) => false,
        None => cause
            .to_string()
            .to_ascii_lowercase()
            .contains("unique constraint failed"),
    }
}

fn database_error_is_unique(err: &(dyn DatabaseError + 'static)) -> bool {
    let code_matches = err.code().is_some_and(|code| {
        matches!(
            code.as_ref(),
            SQLITE_CONSTRAINT_UNIQUE | SQLITE_CONSTRAINT_PRIMARYKEY
        )
    });

    code_matches
        || err
            .message()
            .to_ascii_lowercase()
            .contains("unique constraint failed")
}
