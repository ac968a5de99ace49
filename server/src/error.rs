use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use promptcad::{ExportError, RefineError, SessionError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("interpretation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Session(SessionError::NotFound(_)) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Session(SessionError::Busy(_)) => (StatusCode::CONFLICT, "BUSY"),
            ApiError::Session(SessionError::EmptyMessage) => {
                (StatusCode::BAD_REQUEST, "EMPTY_MESSAGE")
            }
            ApiError::Session(SessionError::Refine(RefineError::Transport(_))) => {
                (StatusCode::BAD_GATEWAY, "CHAT_UNAVAILABLE")
            }
            ApiError::Session(SessionError::Refine(RefineError::Template(_))) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "TEMPLATE_ERROR")
            }
            ApiError::Export(_) => (StatusCode::INTERNAL_SERVER_ERROR, "EXPORT_ERROR"),
            ApiError::Task(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TASK_FAILED"),
        };

        if status.is_server_error() {
            error!("{}", self);
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code,
        };

        (status, Json(body)).into_response()
    }
}
