use crate::error::SupervisorError;
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// JSON error body: `{"error": "<kind>", "message": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "bad_request",
            message: message.into(),
        }
    }
}

impl From<SupervisorError> for ApiError {
    fn from(err: SupervisorError) -> Self {
        let (status, kind) = match &err {
            SupervisorError::UnknownScript { .. } => (StatusCode::BAD_REQUEST, "unknown_script"),
            SupervisorError::InvalidPort { .. } => (StatusCode::BAD_REQUEST, "invalid_port"),
            SupervisorError::SpawnFailure { .. } | SupervisorError::SpawnError { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "spawn_failure")
            }
            SupervisorError::PartialKillFailure { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "partial_kill")
            }
        };
        Self {
            status,
            kind,
            message: err.message(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!("{}: {}", self.kind, self.message);
        } else {
            debug!("{}: {}", self.kind, self.message);
        }
        let body = ErrorBody {
            error: self.kind,
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
