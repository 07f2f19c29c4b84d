//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use crate::cache::ArtifactCache;
use crate::station::StationDirectory;
use crate::store::Store;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Station lookups for the list endpoint
    pub directory: StationDirectory,
    /// Chart artifact cache
    pub cache: Arc<ArtifactCache>,
    /// Static fallback over the document root
    pub static_files: ServeDir,
}

impl AppState {
    /// Wire the handlers to a store and a cache sharing it
    pub fn new(store: Arc<Store>, cache: Arc<ArtifactCache>) -> Self {
        let static_files = ServeDir::new(&cache.config().document_root);

        Self {
            directory: StationDirectory::new(store),
            cache,
            static_files,
        }
    }

    /// Document root served by the static fallback
    pub fn document_root(&self) -> PathBuf {
        self.cache.config().document_root.clone()
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
