use std::env;
use std::sync::OnceLock;

use axum::http::{
    HeaderMap,
    header::{AUTHORIZATION, COOKIE},
};
use cookie::{Cookie, CookieBuilder, SameSite};
use time::{Duration, OffsetDateTime};

use taskdeck_core::user::{SESSION_TTL_SECONDS, SessionRecord};

pub const SESSION_COOKIE_NAME: &str = "taskdeck_session";

const COOKIE_PATH: &str = "/";
const COOKIE_SECURE_ENV: &str = "TASKDECK_COOKIE_SECURE";

fn cookie_secure() -> bool {
    static SECURE: OnceLock<bool> = OnceLock::new();
    *SECURE.get_or_init(|| {
        env::var(COOKIE_SECURE_ENV)
            .map(|value| {
                matches!(
                    value.trim().to_ascii_lowercase().as_str(),
                    "1" | "true" | "yes" | "on"
                )
            })
            .unwrap_or(false)
    })
}

fn session_cookie_base(value: String) -> CookieBuilder<'static> {
    let builder = Cookie::build((SESSION_COOKIE_NAME, value))
        .path(COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Lax);

    if cookie_secure() {
        builder.secure(true)
    } else {
        builder
    }
}

pub fn build_session_cookie(session: &SessionRecord) -> String {
    let expires =
        OffsetDateTime::from_unix_timestamp(session.expires_at).unwrap_or(OffsetDateTime::UNIX_EPOCH);

    session_cookie_base(session.id.to_string())
        .max_age(Duration::seconds(SESSION_TTL_SECONDS))
        .expires(expires)
        .build()
        .to_string()
}

pub fn clear_session_cookie() -> String {
    session_cookie_base(String::new()).removal().build().to_string()
}

pub(crate) fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(COOKIE)?.to_str().ok()?;
    Cookie::split_parse(raw)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_owned())
        .filter(|value| !value.is_empty())
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_owned())
}

/// Cookie first, then `Authorization: Bearer`.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    extract_cookie(headers, SESSION_COOKIE_NAME).or_else(|| extract_bearer_token(headers))
}
