// Workspace membership handlers

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
};

use crate::{
    error::AppError,
    http::{JsonBody, json_with_cookies},
    state::AppState,
    types::{ChangeRoleRequest, SuccessResponse},
};

pub(crate) async fn change_member_role_handler(
    Path((workspace_id, user_id)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: JsonBody<ChangeRoleRequest>,
) -> Result<Response, AppError> {
    let caller = state.user_service.authenticate_request(&headers).await?;
    let Json(payload) = payload?;
    state
        .membership_service
        .change_role(&workspace_id, &caller.user.id, &user_id, &payload.role)
        .await?;

    json_with_cookies(StatusCode::OK, SuccessResponse::ok(), &caller.set_cookies)
}

pub(crate) async fn remove_member_handler(
    Path((workspace_id, user_id)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let caller = state.user_service.authenticate_request(&headers).await?;
    state
        .membership_service
        .remove_member(&workspace_id, &caller.user.id, &user_id)
        .await?;

    json_with_cookies(StatusCode::OK, SuccessResponse::ok(), &caller.set_cookies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_member, seed_user, seed_workspace, session_headers, setup_state};
    use taskdeck_core::membership::WorkspaceRole;

    #[tokio::test]
    async fn unknown_role_is_a_validation_error() {
        let (_dir, state) = setup_state().await;
        let owner = seed_user(&state, "owner@example.com").await;
        let workspace = seed_workspace(&state, &owner, "Acme").await;
        let member =
            seed_member(&state, &workspace, "member@example.com", WorkspaceRole::Member).await;

        let err = change_member_role_handler(
            Path((workspace.id.to_string(), member.id.to_string())),
            State(state.clone()),
            session_headers(&state, &owner).await,
            Ok(Json(ChangeRoleRequest {
                role: "superuser".into(),
            })),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn members_are_forbidden_before_the_role_is_parsed() {
        let (_dir, state) = setup_state().await;
        let owner = seed_user(&state, "owner@example.com").await;
        let workspace = seed_workspace(&state, &owner, "Acme").await;
        let member =
            seed_member(&state, &workspace, "member@example.com", WorkspaceRole::Member).await;

        let err = change_member_role_handler(
            Path((workspace.id.to_string(), owner.id.to_string())),
            State(state.clone()),
            session_headers(&state, &member).await,
            Ok(Json(ChangeRoleRequest {
                role: "superuser".into(),
            })),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.message(), "You don't have permission to change member roles");
    }

    #[tokio::test]
    async fn promoting_and_leaving_through_handlers() {
        let (_dir, state) = setup_state().await;
        let owner = seed_user(&state, "owner@example.com").await;
        let workspace = seed_workspace(&state, &owner, "Acme").await;
        let member =
            seed_member(&state, &workspace, "member@example.com", WorkspaceRole::Member).await;

        let response = change_member_role_handler(
            Path((workspace.id.to_string(), member.id.to_string())),
            State(state.clone()),
            session_headers(&state, &owner).await,
            Ok(Json(ChangeRoleRequest {
                role: "admin".into(),
            })),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            state
                .membership_service
                .find_role(&workspace.id, &member.id)
                .await
                .unwrap(),
            Some(WorkspaceRole::Admin)
        );

        remove_member_handler(
            Path((workspace.id.to_string(), member.id.to_string())),
            State(state.clone()),
            session_headers(&state, &member).await,
        )
        .await
        .unwrap();
        assert!(
            !state
                .membership_service
                .is_member(&workspace.id, &member.id)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn requests_without_a_session_are_unauthorized() {
        let (_dir, state) = setup_state().await;
        let err = remove_member_handler(
            Path(("ws".to_owned(), "user".to_owned())),
            State(state.clone()),
            HeaderMap::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
