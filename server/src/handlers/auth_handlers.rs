// Registration and session handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};

use crate::{
    cookies::build_session_cookie,
    error::AppError,
    http::{JsonBody, json_with_cookies},
    types::{RegisterRequest, SessionResponse, SignInRequest, SuccessResponse, UserResponse},
    user::service::UserService,
};

pub(crate) async fn register_handler(
    State(users): State<Arc<UserService>>,
    payload: JsonBody<RegisterRequest>,
) -> Result<Response, AppError> {
    let Json(payload) = payload?;
    let user = users
        .register_user(&payload.name, &payload.email, &payload.password)
        .await?;

    json_with_cookies(StatusCode::CREATED, UserResponse::from(&user), &[])
}

pub(crate) async fn sign_in_handler(
    State(users): State<Arc<UserService>>,
    payload: JsonBody<SignInRequest>,
) -> Result<Response, AppError> {
    let Json(payload) = payload?;
    let (user, session) = users.sign_in(&payload.email, &payload.password).await?;

    json_with_cookies(
        StatusCode::OK,
        UserResponse::from(&user),
        &[build_session_cookie(&session)],
    )
}

pub(crate) async fn sign_out_handler(
    State(users): State<Arc<UserService>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let cleared = users.sign_out(&headers).await?;
    json_with_cookies(StatusCode::OK, SuccessResponse::ok(), &[cleared])
}

pub(crate) async fn session_handler(
    State(users): State<Arc<UserService>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let lookup = users.lookup_session(&headers).await?;
    json_with_cookies(
        StatusCode::OK,
        SessionResponse { user: lookup.user },
        &lookup.cookies,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_state;
    use axum::{
        body::to_bytes,
        http::{HeaderValue, header::COOKIE, header::SET_COOKIE},
    };
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn register_then_sign_in_sets_session_cookie() {
        let (_dir, state) = setup_state().await;

        let response = register_handler(
            State(state.user_service.clone()),
            Ok(Json(RegisterRequest {
                name: "Grace".into(),
                email: "grace@example.com".into(),
                password: "password123".into(),
            })),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["user"]["email"], "grace@example.com");
        assert!(json["user"].get("password_hash").is_none());

        let response = sign_in_handler(
            State(state.user_service.clone()),
            Ok(Json(SignInRequest {
                email: "grace@example.com".into(),
                password: "password123".into(),
            })),
        )
        .await
        .unwrap();
        let set_cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap()
            .to_owned();
        assert!(set_cookie.starts_with("taskdeck_session="));

        let mut headers = HeaderMap::new();
        let pair = set_cookie.split(';').next().unwrap();
        headers.insert(COOKIE, HeaderValue::from_str(pair).unwrap());
        let response = session_handler(State(state.user_service.clone()), headers)
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["user"]["name"], "Grace");
    }

    #[tokio::test]
    async fn session_without_cookie_is_null() {
        let (_dir, state) = setup_state().await;
        let response = session_handler(State(state.user_service.clone()), HeaderMap::new())
            .await
            .unwrap();
        let json = body_json(response).await;
        assert!(json["user"].is_null());
    }

    #[tokio::test]
    async fn sign_in_with_wrong_password_is_unauthorized() {
        let (_dir, state) = setup_state().await;
        let err = sign_in_handler(
            State(state.user_service.clone()),
            Ok(Json(SignInRequest {
                email: "nobody@example.com".into(),
                password: "whatever".into(),
            })),
        )
        .await
        .unwrap_err();

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(payload.error, "invalid credentials");
    }
}
