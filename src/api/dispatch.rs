//! Query Dispatcher
//!
//! Every request lands here. The path is split into percent-decoded segments
//! and the first one selects the handler:
//!
//! ```text
//! /stations                         → station list
//! /pluvio/{name}[/{start}/{end}]    → single-station chart
//! /compare/{a}/{b}[/{start}/{end}]  → two-station chart
//! anything else                     → static file from the document root
//! ```

use axum::{
    extract::{Request, State},
    http::Method,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::routes;
use crate::api::state::AppState;
use crate::cache::QueryKey;
use crate::series::{YearRange, MAX_YEAR, MIN_YEAR};

/// First year of the default chart range
pub const DEFAULT_START_YEAR: i32 = 2011;
/// Last year of the default chart range, also the fallback end for inverted ranges
pub const DEFAULT_END_YEAR: i32 = 2018;

/// Typed view of a request path
#[derive(Debug, Clone, PartialEq)]
pub enum ApiRequest {
    StationsList,
    Chart(ChartQuery),
    Static(String),
}

/// Chart request as written in the path, before range normalization
#[derive(Debug, Clone, PartialEq)]
pub struct ChartQuery {
    pub primary: String,
    pub secondary: Option<String>,
    pub start: Option<i32>,
    pub end: Option<i32>,
}

impl ChartQuery {
    /// Effective year range
    ///
    /// Without both bounds the default range applies. A start after the end
    /// keeps the start and moves the end to [`DEFAULT_END_YEAR`].
    pub fn range(&self) -> YearRange {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start > end => YearRange::new(start, DEFAULT_END_YEAR),
            (Some(start), Some(end)) => YearRange::new(start, end),
            _ => YearRange::new(DEFAULT_START_YEAR, DEFAULT_END_YEAR),
        }
    }

    /// Normalized cache key
    pub fn into_key(self) -> QueryKey {
        let range = self.range();
        QueryKey::new(self.primary, self.secondary, range.start, range.end)
    }
}

/// Parse a request path into an [`ApiRequest`]
pub fn parse_path(path: &str) -> ApiResult<ApiRequest> {
    let segments: Vec<&str> = path.strip_prefix('/').unwrap_or(path).split('/').collect();

    let kind = segments
        .first()
        .and_then(|s| urlencoding::decode(s).ok())
        .map(|s| s.into_owned())
        .unwrap_or_default();

    match kind.as_str() {
        "stations" => Ok(ApiRequest::StationsList),
        "pluvio" => chart_query(&segments, false).map(ApiRequest::Chart),
        "compare" => chart_query(&segments, true).map(ApiRequest::Chart),
        _ => Ok(ApiRequest::Static(path.to_string())),
    }
}

fn chart_query(segments: &[&str], compare: bool) -> ApiResult<ChartQuery> {
    let primary = required_name(segments, 1, "station name")?;

    let (secondary, years_at) = if compare {
        (Some(required_name(segments, 2, "second station name")?), 3)
    } else {
        (None, 2)
    };

    Ok(ChartQuery {
        primary,
        secondary,
        start: optional_year(segments, years_at)?,
        end: optional_year(segments, years_at + 1)?,
    })
}

fn decode(segment: &str) -> ApiResult<String> {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .map_err(|e| ApiError::BadRequest(format!("invalid path segment '{}': {}", segment, e)))
}

fn required_name(segments: &[&str], idx: usize, what: &str) -> ApiResult<String> {
    let name = match segments.get(idx) {
        Some(raw) => decode(raw)?,
        None => String::new(),
    };

    if name.is_empty() {
        return Err(ApiError::BadRequest(format!("missing {}", what)));
    }
    Ok(name)
}

fn optional_year(segments: &[&str], idx: usize) -> ApiResult<Option<i32>> {
    let Some(raw) = segments.get(idx) else {
        return Ok(None);
    };

    let text = decode(raw)?;
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let year: i32 = text
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid year '{}'", text)))?;

    if !YearRange::is_supported_year(year) {
        return Err(ApiError::BadRequest(format!(
            "year {} outside {}..={}",
            year, MIN_YEAR, MAX_YEAR
        )));
    }
    Ok(Some(year))
}

/// Fallback handler routing every request
pub async fn dispatch(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let method = request.method().clone();

    if method == Method::HEAD {
        return routes::static_files::serve(&state, request).await;
    }
    if method != Method::GET {
        return ApiError::MethodNotAllowed(method.to_string()).into_response();
    }

    let parsed = match parse_path(request.uri().path()) {
        Ok(parsed) => parsed,
        Err(e) => return e.into_response(),
    };

    tracing::info!(request = ?parsed, "Dispatching request");

    match parsed {
        ApiRequest::StationsList => routes::stations::list_stations(&state)
            .await
            .into_response(),
        ApiRequest::Chart(query) => routes::charts::chart(&state, query).await.into_response(),
        ApiRequest::Static(_) => routes::static_files::serve(&state, request).await,
    }
}
