//! Chart Routes
//!
//! - GET /pluvio/{name}[/{start}/{end}] - Monthly rainfall chart for one station
//! - GET /compare/{a}/{b}[/{start}/{end}] - Same chart with two stations
//!
//! Both answer `{title, img}` once the artifact exists; the image itself is
//! fetched through the static fallback.

use axum::response::Response;

use crate::api::dispatch::ChartQuery;
use crate::api::dto::ChartResponse;
use crate::api::error::ApiResult;
use crate::api::routes::json_response;
use crate::api::state::AppState;

/// GET /pluvio/... and /compare/...
pub async fn chart(state: &AppState, query: ChartQuery) -> ApiResult<Response> {
    let key = query.into_key();
    let artifact = state.cache.get_or_materialize(&key).await?;

    json_response(&ChartResponse {
        title: key.title(),
        img: artifact.url(),
    })
}
