use std::fmt;

use anyhow::Error as AnyError;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use tracing::error;

#[derive(Debug, Clone, Copy)]
struct ErrorDescriptor {
    status: StatusCode,
    name: &'static str,
    error_type: &'static str,
    default_message: &'static str,
}

const VALIDATION_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::BAD_REQUEST,
    name: "VALIDATION_ERROR",
    error_type: "BAD_REQUEST",
    default_message: "Invalid input.",
};

const UNAUTHORIZED_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::UNAUTHORIZED,
    name: "AUTHENTICATION_REQUIRED",
    error_type: "AUTHENTICATION_REQUIRED",
    default_message: "You must sign in first to access this resource.",
};

const FORBIDDEN_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::FORBIDDEN,
    name: "ACTION_FORBIDDEN",
    error_type: "NO_PERMISSION",
    default_message: "Action forbidden.",
};

const NOT_FOUND_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::NOT_FOUND,
    name: "NOT_FOUND",
    error_type: "RESOURCE_NOT_FOUND",
    default_message: "Resource not found.",
};

const CONFLICT_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::CONFLICT,
    name: "RESOURCE_ALREADY_EXISTS",
    error_type: "RESOURCE_ALREADY_EXISTS",
    default_message: "Resource already exists.",
};

const INTERNAL_SERVER_ERROR_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::INTERNAL_SERVER_ERROR,
    name: "INTERNAL_SERVER_ERROR",
    error_type: "INTERNAL_SERVER_ERROR",
    default_message: "An internal error occurred.",
};

pub(crate) const INVALID_INVITATION_MESSAGE: &str = "Invalid or expired invitation";

#[derive(Debug)]
pub struct AppError {
    descriptor: &'static ErrorDescriptor,
    name: String,
    error_type: String,
    message: String,
    data: Option<JsonValue>,
    source: Option<AnyError>,
}

impl AppError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::from_descriptor(&VALIDATION_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        Self::from_descriptor(&UNAUTHORIZED_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        Self::from_descriptor(&FORBIDDEN_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::from_descriptor(&NOT_FOUND_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::from_descriptor(&CONFLICT_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn internal(error: AnyError) -> Self {
        error!(?error, "internal server error");
        Self::from_descriptor(&INTERNAL_SERVER_ERROR_DESCRIPTOR, None).with_source(error)
    }

    pub(crate) fn from_anyhow(error: AnyError) -> Self {
        Self::internal(error)
    }

    /// `action` completes the sentence "You don't have permission to ...".
    pub(crate) fn permission_denied(workspace_id: &str, action: &str) -> Self {
        Self::forbidden(format!("You don't have permission to {action}"))
            .with_name("WORKSPACE_PERMISSION_DENIED")
            .with_data(json!({ "workspaceId": workspace_id }))
    }

    pub(crate) fn workspace_not_found(workspace_id: &str) -> Self {
        Self::not_found("Workspace not found")
            .with_name("WORKSPACE_NOT_FOUND")
            .with_data(json!({ "workspaceId": workspace_id }))
    }

    /// Missing, consumed and expired tokens all look the same from outside.
    pub(crate) fn invalid_invitation() -> Self {
        Self::not_found(INVALID_INVITATION_MESSAGE).with_name("INVALID_INVITATION")
    }

    pub fn status(&self) -> StatusCode {
        self.descriptor.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn into_payload(self) -> (StatusCode, UserFriendlyPayload) {
        let AppError {
            descriptor,
            name,
            error_type,
            message,
            data,
            source: _,
        } = self;

        let status = descriptor.status;
        let (code, reason) = code_and_reason(status);
        let payload = UserFriendlyPayload {
            status: status.as_u16(),
            code,
            reason,
            error_type,
            name,
            error: message,
            data,
        };

        (status, payload)
    }

    fn from_descriptor(descriptor: &'static ErrorDescriptor, message: Option<String>) -> Self {
        Self {
            descriptor,
            name: descriptor.name.to_owned(),
            error_type: descriptor.error_type.to_owned(),
            message: message.unwrap_or_else(|| descriptor.default_message.to_owned()),
            data: None,
            source: None,
        }
    }

    fn with_source(mut self, error: AnyError) -> Self {
        self.source = Some(error);
        self
    }

    pub(crate) fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub(crate) fn with_data(mut self, data: JsonValue) -> Self {
        self.data = Some(data);
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|err| err.as_ref() as _)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation("Invalid request body")
            .with_data(json!({ "detail": rejection.body_text() }))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, payload) = self.into_payload();
        (status, Json(payload)).into_response()
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct UserFriendlyPayload {
    pub(crate) status: u16,
    pub(crate) code: String,
    pub(crate) reason: String,
    #[serde(rename = "type")]
    pub(crate) error_type: String,
    pub(crate) name: String,
    pub(crate) error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) data: Option<JsonValue>,
}

fn code_and_reason(status: StatusCode) -> (String, String) {
    let reason = status
        .canonical_reason()
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("Status {}", status.as_u16()));

    let code = reason
        .chars()
        .map(|ch| match ch {
            'a'..='z' => ch.to_ascii_uppercase(),
            'A'..='Z' | '0'..='9' => ch,
            _ => '_',
        })
        .collect::<String>();

    (code, reason)
}
