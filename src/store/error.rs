//! Store error types
//!
//! Defines all errors that can occur in the SQLite store.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur in the store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database cannot be reached right now (busy, locked, cannot open)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Statement preparation or execution failed
    #[error("Query failed: {0}")]
    Query(String),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection mutex was poisoned by a panicking holder
    #[error("Lock error: {0}")]
    Lock(String),
}

impl StoreError {
    /// Whether the failure means the backing store is unreachable
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Lock(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Query(err.to_string()),
        }
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
