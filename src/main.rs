//! Pluvio API Server
//!
//! Run with: cargo run --bin pluvio
//!
//! Configuration is read from `config.toml` (see `pluvio-cli config`) with
//! `PLUVIO_*` environment overrides. `RUST_LOG` overrides the log level.

use pluvio::api::{serve, AppState};
use pluvio::cache::ArtifactCache;
use pluvio::chart::BitmapRenderer;
use pluvio::config::Config;
use pluvio::store::Store;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_default();
    pluvio::logging::init(&config.logging);

    tracing::info!("Starting Pluvio server v{}", env!("CARGO_PKG_VERSION"));

    // Open the shared store
    tracing::info!("Database: {}", config.storage.database_path);
    let store = Arc::new(Store::open(&config.storage.database_path)?);

    // Chart cache
    let cache_config = config.charts.to_cache_config();
    tracing::info!(
        "Charts under {:?}/{}, render timeout {:?}",
        cache_config.document_root,
        cache_config.artifact_dir,
        cache_config.render_timeout
    );
    let cache = Arc::new(ArtifactCache::new(
        Arc::clone(&store),
        Arc::new(BitmapRenderer::new()),
        cache_config,
    ));

    let api_config = config.server.to_api_config();
    let state = AppState::new(store, cache);
    tracing::info!("Serving static files from {:?}", state.document_root());

    // Run server
    serve(state, &api_config).await?;

    tracing::info!("Pluvio server stopped");
    Ok(())
}
