//! Station Routes
//!
//! - GET /stations - Every station with its coordinates

use axum::response::Response;

use crate::api::dto::StationResponse;
use crate::api::error::ApiResult;
use crate::api::routes::json_response;
use crate::api::state::AppState;

/// GET /stations
pub async fn list_stations(state: &AppState) -> ApiResult<Response> {
    let stations: Vec<StationResponse> = state
        .directory
        .list()?
        .into_iter()
        .map(StationResponse::from)
        .collect();

    tracing::debug!(count = stations.len(), "Listing stations");

    json_response(&stations)
}
