//! API Routes
//!
//! Handlers invoked by the dispatcher, organized by endpoint.

pub mod charts;
pub mod static_files;
pub mod stations;

use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::api::error::{ApiError, ApiResult};

/// UTF-8 JSON body with an explicit `Content-Length`
pub(crate) fn json_response<T: Serialize>(value: &T) -> ApiResult<Response> {
    let body = serde_json::to_vec(value)
        .map_err(|e| ApiError::Internal(format!("Failed to encode response: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_LENGTH, body.len().to_string()),
        ],
        body,
    )
        .into_response())
}
