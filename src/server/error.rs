//! API error type and its HTTP mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::inference::engine::EngineError;
use crate::query::QueryError;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed or incomplete request; inference never ran.
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Inference timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: &'static str,
    pub detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Inference(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::ModelUnavailable(_) => "model_unavailable",
            ApiError::Inference(_) => "inference_error",
            ApiError::Timeout(_) => "timeout",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn detail(&self) -> &str {
        match self {
            ApiError::Validation(d)
            | ApiError::ModelUnavailable(d)
            | ApiError::Inference(d)
            | ApiError::Timeout(d)
            | ApiError::Internal(d) => d,
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        ApiError::Validation(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Validation(e.body_text())
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::ModelUnavailable(reason) => ApiError::ModelUnavailable(reason),
            EngineError::Timeout(_) => ApiError::Timeout(e.to_string()),
            EngineError::Inference(inner) => ApiError::Inference(inner.to_string()),
            EngineError::TaskFailed(reason) => ApiError::Internal(reason),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.kind(),
            detail: self.detail().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
