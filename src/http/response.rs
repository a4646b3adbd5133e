//! Error responses.
//!
//! # Responsibilities
//! - Render pipeline and handler errors as JSON bodies
//! - Echo the correlation id so clients can quote it
//!
//! # Design Decisions
//! - One body shape for every error: `{ error, message, request_id }`
//! - Internal details stay in logs, never in the body

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::context::ContextStore;
use crate::observability::record::Classify;

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Build an error response for the current request.
pub fn error_response(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: code,
        message: message.into(),
        request_id: ContextStore::request_id(),
    };
    (status, Json(body)).into_response()
}

/// Failures raised by handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Classify for ApiError {
    fn classification(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(request_id = ?ContextStore::request_id(), detail = %detail, "Internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        error_response(self.status(), self.classification(), message)
    }
}
