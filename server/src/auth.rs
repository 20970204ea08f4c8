use argon2::{
    Argon2,
    password_hash::{
        Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        rand_core::OsRng,
    },
};
use tracing::debug;

use taskdeck_core::user::{SessionRecord, UserRecord, UserStore};

use crate::error::AppError;

const INVALID_CREDENTIALS: &str = "invalid credentials";

pub fn generate_password_hash(password: &str) -> Result<String, PasswordHashError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// False for a mismatch and for a stored hash that does not parse.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Unknown email, empty hash and wrong password produce the same error.
pub(crate) async fn authenticate_with_password(
    user_store: &UserStore,
    email: &str,
    password: &str,
) -> Result<(UserRecord, SessionRecord), AppError> {
    let Some(user) = user_store
        .find_by_email(email)
        .await
        .map_err(AppError::from_anyhow)?
    else {
        debug!("sign-in rejected: unknown email");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    };

    if user.password_hash.trim().is_empty() {
        debug!(user_id = %user.id, "sign-in rejected: no password set");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    if !verify_password(password, &user.password_hash) {
        debug!(user_id = %user.id, "sign-in rejected: password mismatch");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    let session = user_store
        .create_session(&user.id)
        .await
        .map_err(AppError::from_anyhow)?;

    Ok((user, session))
}
