//! Pluvio HTTP API
//!
//! HTTP layer built with Axum. A single fallback handler parses every path
//! (see [`dispatch`]) so unknown paths fall through to static files.
//!
//! # Endpoints
//!
//! - `GET /stations` - List stations as `[{nom, long, lat}]`
//! - `GET /pluvio/{name}[/{start}/{end}]` - Chart for one station, `{title, img}`
//! - `GET /compare/{a}/{b}[/{start}/{end}]` - Chart for two stations
//! - anything else - Static file from the document root
//!
//! # Example
//!
//! ```rust,ignore
//! use pluvio::api::{serve, ApiConfig, AppState};
//! use pluvio::cache::{ArtifactCache, CacheConfig};
//! use pluvio::chart::BitmapRenderer;
//! use pluvio::store::Store;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(Store::open("pluvio.sqlite")?);
//!     let renderer = Arc::new(BitmapRenderer::new());
//!     let cache = Arc::new(ArtifactCache::new(Arc::clone(&store), renderer, CacheConfig::default()));
//!     let config = ApiConfig::default();
//!
//!     serve(AppState::new(store, cache), &config).await?;
//!     Ok(())
//! }
//! ```

pub mod dispatch;
pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use dispatch::{parse_path, ApiRequest, ChartQuery};
pub use error::{ApiError, ApiResult};
pub use state::{ApiConfig, AppState};

use axum::Router;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the API router with the dispatcher and middleware
pub fn build_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .fallback(dispatch::dispatch)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Pluvio API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Pluvio API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
