// Workspace management handlers

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
    types::{
        MemberResponse, SuccessResponse, WorkspaceDetailsResponse, WorkspaceListResponse,
        WorkspaceNameRequest, WorkspaceResponse, WorkspaceSummaryResponse,
    },
};

pub(crate) async fn create_workspace_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: JsonBody<WorkspaceNameRequest>,
) -> Result<Response, AppError> {
    let caller = state.user_service.authenticate_request(&headers).await?;
    let Json(payload) = payload?;
    let workspace = state
        .workspace_service
        .create_workspace(&caller.user, &payload.name)
        .await?;

    json_with_cookies(
        StatusCode::CREATED,
        WorkspaceResponse::from(&workspace),
        &caller.set_cookies,
    )
}

pub(crate) async fn list_workspaces_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let caller = state.user_service.authenticate_request(&headers).await?;
    let memberships = state.workspace_service.list_workspaces(&caller.user).await?;

    let response = WorkspaceListResponse {
        workspaces: memberships
            .iter()
            .map(WorkspaceSummaryResponse::from)
            .collect(),
    };
    json_with_cookies(StatusCode::OK, response, &caller.set_cookies)
}

pub(crate) async fn get_workspace_handler(
    Path(workspace_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let caller = state.user_service.authenticate_request(&headers).await?;
    let details = state
        .workspace_service
        .get_workspace(&workspace_id, &caller.user)
        .await?;

    let response = WorkspaceDetailsResponse {
        workspace: WorkspaceResponse::from(&details.workspace),
        role: details.role,
        members: details.members.iter().map(MemberResponse::from).collect(),
    };
    json_with_cookies(StatusCode::OK, response, &caller.set_cookies)
}

pub(crate) async fn rename_workspace_handler(
    Path(workspace_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: JsonBody<WorkspaceNameRequest>,
) -> Result<Response, AppError> {
    let caller = state.user_service.authenticate_request(&headers).await?;
    let Json(payload) = payload?;
    let workspace = state
        .workspace_service
        .rename_workspace(&workspace_id, &caller.user, &payload.name)
        .await?;

    json_with_cookies(
        StatusCode::OK,
        WorkspaceResponse::from(&workspace),
        &caller.set_cookies,
    )
}

pub(crate) async fn delete_workspace_handler(
    Path(workspace_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let caller = state.user_service.authenticate_request(&headers).await?;
    state
        .workspace_service
        .delete_workspace(&workspace_id, &caller.user)
        .await?;

    json_with_cookies(StatusCode::OK, SuccessResponse::ok(), &caller.set_cookies)
}
