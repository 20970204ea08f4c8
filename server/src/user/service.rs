use std::sync::Arc;

use axum::{extract::FromRef, http::HeaderMap};
use tracing::info;

use taskdeck_core::{
    db::errors::is_unique_violation,
    user::{SessionRecord, UserProfile, UserRecord, UserStore},
};

use crate::{
    AppError,
    auth::{authenticate_with_password, generate_password_hash},
    cookies::{build_session_cookie, clear_session_cookie, extract_session_token},
    observability::record_authenticated_identity,
    state::AppState,
    types::{AuthenticatedCaller, SessionLookup},
    utils::users::{is_valid_email, name_is_long_enough, password_is_long_enough},
};

const DUPLICATE_EMAIL: &str = "User with this email already exists";

pub struct UserService {
    user_store: UserStore,
}

impl UserService {
    pub fn new(user_store: UserStore) -> Self {
        Self { user_store }
    }

    /// Fields are checked in order and the first violation is reported.
    pub async fn register_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, AppError> {
        if !name_is_long_enough(name) {
            return Err(AppError::validation("Name must be at least 2 characters"));
        }
        if !is_valid_email(email) {
            return Err(AppError::validation("Invalid email address"));
        }
        if !password_is_long_enough(password) {
            return Err(AppError::validation(
                "Password must be at least 8 characters",
            ));
        }

        if self
            .user_store
            .find_by_email(email)
            .await
            .map_err(AppError::from_anyhow)?
            .is_some()
        {
            return Err(AppError::conflict(DUPLICATE_EMAIL));
        }

        let password_hash =
            generate_password_hash(password).map_err(|err| AppError::internal(anyhow::anyhow!(err)))?;

        let user = self
            .user_store
            .create(email, name, &password_hash)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    AppError::conflict(DUPLICATE_EMAIL)
                } else {
                    AppError::from_anyhow(err)
                }
            })?;

        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(UserRecord, SessionRecord), AppError> {
        let (user, session) = authenticate_with_password(&self.user_store, email, password).await?;
        info!(user_id = %user.id, "user signed in");
        Ok((user, session))
    }

    pub async fn fetch_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        self.user_store
            .find_by_email(email)
            .await
            .map_err(AppError::from_anyhow)
    }

    pub async fn authenticate_request(
        &self,
        headers: &HeaderMap,
    ) -> Result<AuthenticatedCaller, AppError> {
        let Some(session_id) = extract_session_token(headers) else {
            return Err(AppError::unauthorized("authentication required"));
        };

        let Some((user, session)) = self.resolve_session(&session_id).await? else {
            return Err(AppError::unauthorized("session expired"));
        };

        record_authenticated_identity(&user.id);
        Ok(AuthenticatedCaller {
            user,
            set_cookies: vec![build_session_cookie(&session)],
        })
    }

    /// Like `authenticate_request`, but an absent or stale session is not an
    /// error. A stale cookie is cleared.
    pub async fn lookup_session(&self, headers: &HeaderMap) -> Result<SessionLookup, AppError> {
        let Some(session_id) = extract_session_token(headers) else {
            return Ok(SessionLookup {
                user: None,
                cookies: Vec::new(),
            });
        };

        match self.resolve_session(&session_id).await? {
            Some((user, session)) => Ok(SessionLookup {
                user: Some(UserProfile::from(&user)),
                cookies: vec![build_session_cookie(&session)],
            }),
            None => Ok(SessionLookup {
                user: None,
                cookies: vec![clear_session_cookie()],
            }),
        }
    }

    /// Always succeeds; returns the cookie that clears the session.
    pub async fn sign_out(&self, headers: &HeaderMap) -> Result<String, AppError> {
        if let Some(session_id) = extract_session_token(headers) {
            self.user_store
                .delete_session(&session_id)
                .await
                .map_err(AppError::from_anyhow)?;
        }
        Ok(clear_session_cookie())
    }

    async fn resolve_session(
        &self,
        session_id: &str,
    ) -> Result<Option<(UserRecord, SessionRecord)>, AppError> {
        let Some(session) = self
            .user_store
            .refresh_session(session_id)
            .await
            .map_err(AppError::from_anyhow)?
        else {
            return Ok(None);
        };

        let user = self
            .user_store
            .find_by_id(&session.user_id)
            .await
            .map_err(AppError::from_anyhow)?;

        match user {
            Some(user) => Ok(Some((user, session))),
            None => {
                self.user_store
                    .delete_session(&session.id)
                    .await
                    .map_err(AppError::from_anyhow)?;
                Ok(None)
            }
        }
    }
}

impl FromRef<AppState> for Arc<UserService> {
    fn from_ref(state: &AppState) -> Self {
        state.user_service.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cookies::SESSION_COOKIE_NAME, test_support::setup_state};
    use axum::http::{HeaderValue, StatusCode, header::COOKIE};

    fn cookie_headers(session_id: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{SESSION_COOKIE_NAME}={session_id}")).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn registration_reports_the_first_invalid_field() {
        let (_dir, state) = setup_state().await;
        let service = &state.user_service;

        let err = service.register_user("A", "bad", "short").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Name must be at least 2 characters");

        let err = service.register_user("Al", "bad", "short").await.unwrap_err();
        assert_eq!(err.message(), "Invalid email address");

        let err = service
            .register_user("Al", "al@example.com", "short")
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Password must be at least 8 characters");
    }

    #[tokio::test]
    async fn registration_rejects_duplicate_email_case_insensitively() {
        let (_dir, state) = setup_state().await;
        let service = &state.user_service;

        let user = service
            .register_user("Alice", "alice@example.com", "password123")
            .await
            .unwrap();
        assert!(user.password_hash.starts_with("$argon2"));

        let err = service
            .register_user("Alice Again", "ALICE@example.com", "password456")
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.message(), DUPLICATE_EMAIL);
    }

    #[tokio::test]
    async fn session_cookie_authenticates_until_sign_out() {
        let (_dir, state) = setup_state().await;
        let service = &state.user_service;
        service
            .register_user("Frank", "frank@example.com", "password123")
            .await
            .unwrap();
        let (user, session) = service
            .sign_in("frank@example.com", "password123")
            .await
            .unwrap();

        let headers = cookie_headers(&session.id);
        let caller = service.authenticate_request(&headers).await.unwrap();
        assert_eq!(caller.user.id, user.id);
        assert_eq!(caller.set_cookies.len(), 1);

        let lookup = service.lookup_session(&headers).await.unwrap();
        assert_eq!(lookup.user.map(|profile| profile.id), Some(user.id.clone()));

        service.sign_out(&headers).await.unwrap();
        let err = service.authenticate_request(&headers).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let lookup = service.lookup_session(&headers).await.unwrap();
        assert!(lookup.user.is_none());
        assert_eq!(lookup.cookies.len(), 1);
    }

    #[tokio::test]
    async fn missing_credentials_are_unauthorized() {
        let (_dir, state) = setup_state().await;
        let err = state
            .user_service
            .authenticate_request(&HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
