//! Cache error types

use crate::chart::RenderError;
use crate::series::AggregateError;
use crate::station::DirectoryError;
use crate::store::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while looking up or materializing an artifact
#[derive(Error, Debug)]
pub enum CacheError {
    /// Year range outside what a chart can cover
    #[error("Invalid year range: {0}")]
    InvalidRange(String),

    /// A station name in the key has no match
    #[error("Station not found: {0}")]
    NotFound(String),

    /// No samples survived filtering for one of the stations
    #[error("Empty series: {0}")]
    EmptySeries(String),

    /// The renderer could not produce an image
    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    /// The renderer did not finish in time
    #[error("Render timed out after {0:?}")]
    RenderTimeout(Duration),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Moving or removing artifact files failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DirectoryError> for CacheError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound(name) => CacheError::NotFound(name),
            DirectoryError::Store(e) => CacheError::Store(e),
        }
    }
}

impl From<AggregateError> for CacheError {
    fn from(err: AggregateError) -> Self {
        match err {
            e @ AggregateError::EmptySeries { .. } => CacheError::EmptySeries(e.to_string()),
            AggregateError::Store(e) => CacheError::Store(e),
        }
    }
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
