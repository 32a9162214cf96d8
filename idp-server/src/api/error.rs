//! API Error Handling
//!
//! Maps service failures onto HTTP responses with a `{"error": message}` body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::service::WorkloadError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    BadGateway(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::BadGateway(msg) => {
                tracing::error!("Upstream error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<WorkloadError> for ApiError {
    fn from(err: WorkloadError) -> Self {
        match err {
            WorkloadError::Validation(msg) => ApiError::BadRequest(msg),
            WorkloadError::NotFound(msg) => ApiError::NotFound(msg),
            err @ WorkloadError::Upstream { .. } => ApiError::BadGateway(err.to_string()),
            WorkloadError::Configuration(msg) | WorkloadError::Internal(msg) => {
                ApiError::InternalError(msg)
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
