// Router configuration

use axum::{
    Router,
    http::Method,
    routing::{delete, get, patch, post},
};
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{
        auth_handlers::*, health_handlers::*, invitation_handlers::*, member_handlers::*,
        workspace_handlers::*,
    },
    observability,
    state::AppState,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    Router::new()
        // Health
        .route("/health", get(health_handler))
        // Authentication
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/sign-in", post(sign_in_handler))
        .route("/api/auth/sign-out", post(sign_out_handler))
        .route("/api/auth/session", get(session_handler))
        // Workspaces
        .route(
            "/api/workspaces",
            post(create_workspace_handler).get(list_workspaces_handler),
        )
        .route(
            "/api/workspaces/{workspace_id}",
            get(get_workspace_handler)
                .patch(rename_workspace_handler)
                .delete(delete_workspace_handler),
        )
        // Members
        .route(
            "/api/workspaces/{workspace_id}/members/{user_id}",
            patch(change_member_role_handler).delete(remove_member_handler),
        )
        // Invitations
        .route(
            "/api/workspaces/{workspace_id}/invitations",
            post(create_invitation_handler).get(list_invitations_handler),
        )
        .route(
            "/api/workspaces/{workspace_id}/invitations/{invitation_id}",
            delete(revoke_invitation_handler),
        )
        .route("/api/invitations/redeem", post(redeem_invitation_handler))
        .route("/api/join", post(redeem_invitation_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(observability::http_make_span())
                .on_response(observability::response_logger()),
        )
        .layer(cors)
        .layer(observability::request_context_layer())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        TEST_PASSWORD, count_members, seed_member, seed_user, seed_workspace, setup_state,
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
        response::Response,
    };
    use serde_json::{Value, json};
    use taskdeck_core::membership::WorkspaceRole;
    use tower::ServiceExt;

    fn json_request(method: Method, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn empty_request(method: Method, uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn sign_in(router: &Router, email: &str) -> String {
        let response = router
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/auth/sign-in",
                None,
                json!({ "email": email, "password": TEST_PASSWORD }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .unwrap()
            .to_owned()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (_dir, state) = setup_state().await;
        let response = build_router(state)
            .oneshot(empty_request(Method::GET, "/health", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn invite_and_join_over_http() {
        let (_dir, state) = setup_state().await;
        let owner = seed_user(&state, "owner@example.com").await;
        let bob = seed_user(&state, "bob@x.com").await;
        let workspace = seed_workspace(&state, &owner, "Acme").await;
        let router = build_router(state.clone());

        let owner_cookie = sign_in(&router, "owner@example.com").await;
        let response = router
            .clone()
            .oneshot(json_request(
                Method::POST,
                &format!("/api/workspaces/{}/invitations", workspace.id),
                Some(&owner_cookie),
                json!({ "email": "bob@x.com" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let link = body_json(response).await["link"]
            .as_str()
            .unwrap()
            .to_owned();
        let token = link.rsplit("token=").next().unwrap().to_owned();

        let bob_cookie = sign_in(&router, "bob@x.com").await;
        let response = router
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/join",
                Some(&bob_cookie),
                json!({ "token": token }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "joined");
        assert_eq!(count_members(&state, &workspace.id, &bob.id).await, 1);

        // A second use of the same link is a dead token.
        let response = router
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/invitations/redeem",
                Some(&bob_cookie),
                json!({ "token": token }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid or expired invitation");
        assert_eq!(body["status"], 404);
        assert_eq!(count_members(&state, &workspace.id, &bob.id).await, 1);
    }

    #[tokio::test]
    async fn member_invite_is_forbidden_over_http() {
        let (_dir, state) = setup_state().await;
        let owner = seed_user(&state, "owner@example.com").await;
        let workspace = seed_workspace(&state, &owner, "Acme").await;
        seed_member(&state, &workspace, "member@example.com", WorkspaceRole::Member).await;
        let router = build_router(state);

        let cookie = sign_in(&router, "member@example.com").await;
        let response = router
            .oneshot(json_request(
                Method::POST,
                &format!("/api/workspaces/{}/invitations", workspace.id),
                Some(&cookie),
                json!({ "email": "friend@example.com" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_json(response).await["error"],
            "You don't have permission to invite members"
        );
    }

    #[tokio::test]
    async fn workspace_routes_require_a_session() {
        let (_dir, state) = setup_state().await;
        let response = build_router(state)
            .oneshot(empty_request(Method::GET, "/api/workspaces", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_validation_errors_are_bad_requests() {
        let (_dir, state) = setup_state().await;
        let response = build_router(state)
            .oneshot(json_request(
                Method::POST,
                "/api/auth/register",
                None,
                json!({ "name": "Zoe", "email": "zoe@example", "password": "password123" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["name"], "VALIDATION_ERROR");
        assert_eq!(body["error"], "Invalid email address");
    }

    fn raw_request(
        uri: &str,
        cookie: Option<&str>,
        content_type: Option<&str>,
        body: &str,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(Method::POST).uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_owned())).unwrap()
    }

    #[tokio::test]
    async fn unauthenticated_join_is_unauthorized_whatever_the_body() {
        let (_dir, state) = setup_state().await;
        let router = build_router(state);

        for request in [
            raw_request("/api/join", None, None, r#"{"token":"abc"}"#),
            raw_request("/api/join", None, Some("application/json"), "{not json"),
            raw_request("/api/join", None, Some("application/json"), r#"{"token": 5}"#),
        ] {
            let response = router.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let body = body_json(response).await;
            assert_eq!(body["status"], 401);
            assert_eq!(body["error"], "authentication required");
        }
    }

    #[tokio::test]
    async fn malformed_bodies_get_the_structured_validation_error() {
        let (_dir, state) = setup_state().await;
        seed_user(&state, "bob@x.com").await;
        let router = build_router(state);
        let cookie = sign_in(&router, "bob@x.com").await;

        for request in [
            raw_request("/api/join", Some(&cookie), None, r#"{"token":"abc"}"#),
            raw_request("/api/join", Some(&cookie), Some("application/json"), "{not json"),
            raw_request("/api/join", Some(&cookie), Some("application/json"), r#"{"token": 5}"#),
            raw_request("/api/auth/register", None, Some("application/json"), "name=zoe"),
        ] {
            let response = router.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = body_json(response).await;
            assert_eq!(body["name"], "VALIDATION_ERROR");
            assert_eq!(body["error"], "Invalid request body");
            assert!(body["data"]["detail"].is_string());
        }
    }
}
