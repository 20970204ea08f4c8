// Invitation handlers

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
        CreateInvitationRequest, InvitationCreatedResponse, InvitationListResponse,
        InvitationResponse, RedeemInvitationRequest, RedemptionResponse, SuccessResponse,
    },
};

pub(crate) async fn create_invitation_handler(
    Path(workspace_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: JsonBody<CreateInvitationRequest>,
) -> Result<Response, AppError> {
    let caller = state.user_service.authenticate_request(&headers).await?;
    let Json(payload) = payload?;
    let created = state
        .invitation_service
        .create_invitation(&workspace_id, &caller.user, &payload.email)
        .await?;

    let status = if created.reused {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    json_with_cookies(
        status,
        InvitationCreatedResponse::from(&created),
        &caller.set_cookies,
    )
}

pub(crate) async fn list_invitations_handler(
    Path(workspace_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let caller = state.user_service.authenticate_request(&headers).await?;
    let pending = state
        .invitation_service
        .list_pending_invitations(&workspace_id, &caller.user)
        .await?;

    let response = InvitationListResponse {
        invitations: pending.iter().map(InvitationResponse::from).collect(),
    };
    json_with_cookies(StatusCode::OK, response, &caller.set_cookies)
}

pub(crate) async fn revoke_invitation_handler(
    Path((workspace_id, invitation_id)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let caller = state.user_service.authenticate_request(&headers).await?;
    state
        .invitation_service
        .revoke_invitation(&workspace_id, &caller.user, &invitation_id)
        .await?;

    json_with_cookies(StatusCode::OK, SuccessResponse::ok(), &caller.set_cookies)
}

pub(crate) async fn redeem_invitation_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: JsonBody<RedeemInvitationRequest>,
) -> Result<Response, AppError> {
    let caller = state.user_service.authenticate_request(&headers).await?;
    let Json(payload) = payload?;
    let outcome = state
        .invitation_service
        .redeem_invitation(&payload.token, &caller.user)
        .await?;

    json_with_cookies(
        StatusCode::OK,
        RedemptionResponse::from(&outcome),
        &caller.set_cookies,
    )
}
