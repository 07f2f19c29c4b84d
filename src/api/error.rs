//! API Error Types
//!
//! Defines error types for the API layer and implements conversion
//! to HTTP responses with appropriate status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::cache::CacheError;
use crate::station::DirectoryError;
use crate::store::StoreError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed path: missing station segment, non-numeric year
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Station name has no match
    #[error("Not found: {0}")]
    NotFound(String),

    /// No samples in the requested range
    #[error("No data: {0}")]
    EmptySeries(String),

    /// Chart could not be produced
    #[error("Render failure: {0}")]
    Render(String),

    /// Chart rendering exceeded its time budget
    #[error("Render timed out after {0:?}")]
    Timeout(Duration),

    /// Backing store unreachable
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Method other than GET/HEAD
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        if err.is_unavailable() {
            ApiError::StoreUnavailable(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound(name) => ApiError::NotFound(name),
            DirectoryError::Store(e) => e.into(),
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::InvalidRange(msg) => ApiError::BadRequest(msg),
            CacheError::NotFound(name) => ApiError::NotFound(name),
            CacheError::EmptySeries(msg) => ApiError::EmptySeries(msg),
            CacheError::Render(e) => ApiError::Render(e.to_string()),
            CacheError::RenderTimeout(d) => ApiError::Timeout(d),
            CacheError::Store(e) => e.into(),
            CacheError::Io(e) => ApiError::Io(e),
        }
    }
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::EmptySeries(_) => (StatusCode::UNPROCESSABLE_ENTITY, "EMPTY_SERIES"),
            ApiError::Render(_) => (StatusCode::INTERNAL_SERVER_ERROR, "RENDER_FAILURE"),
            ApiError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "RENDER_TIMEOUT"),
            ApiError::StoreUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE")
            }
            ApiError::MethodNotAllowed(_) => (StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Unknown stations answer with a bare 404
        if let ApiError::NotFound(name) = &self {
            tracing::info!(station = %name, "Station not found");
            return status.into_response();
        }

        let request_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "API error occurred"
            );
        } else {
            tracing::warn!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "Request rejected"
            );
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
