use crate::ledger::CallError;
use crate::orchestration::{OperationFailure, StakingError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not connected: {0}")]
    NotConnected(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Rejected: {0}")]
    UserRejected(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<StakingError> for AppError {
    fn from(err: StakingError) -> Self {
        let msg = err.to_string();
        match err {
            StakingError::NotConnected => AppError::NotConnected(msg),
            StakingError::InvalidAmount(_) => AppError::BadRequest(msg),
            StakingError::NoSnapshot => AppError::NotFound(msg),
            StakingError::UserRejected { .. } => AppError::UserRejected(msg),
            StakingError::OperationFailed {
                cause: OperationFailure::Call(CallError::Decode(_)),
                ..
            } => AppError::Internal(msg),
            StakingError::AuthorizationFailed { .. } | StakingError::OperationFailed { .. } => {
                AppError::Upstream(msg)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotConnected(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::UserRejected(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
