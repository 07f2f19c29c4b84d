//! # Pluvio
//!
//! Rain-gauge station service: answers HTTP queries with station metadata or
//! with monthly rainfall charts for one or two stations over a year range.
//! Charts are generated once per distinct query and cached for good.
//!
//! ## Modules
//!
//! - [`store`]: SQLite store for stations, measurements and cache entries
//! - [`station`]: Station directory (name → identifier)
//! - [`series`]: Monthly aggregation of raw measurements
//! - [`chart`]: Chart renderer seam and the PNG renderer
//! - [`cache`]: Artifact cache keyed by normalized chart queries
//! - [`api`]: Path dispatcher and HTTP server with Axum
//! - [`import`]: CSV loaders for the gauge network exports
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pluvio::cache::{ArtifactCache, CacheConfig, QueryKey};
//! use pluvio::chart::BitmapRenderer;
//! use pluvio::store::Store;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(Store::open("pluvio.sqlite")?);
//!     let cache = ArtifactCache::new(
//!         Arc::clone(&store),
//!         Arc::new(BitmapRenderer::new()),
//!         CacheConfig::default(),
//!     );
//!
//!     let key = QueryKey::new("Bron", None, 2012, 2014);
//!     let artifact = cache.get_or_materialize(&key).await?;
//!     println!("Chart at {}", artifact.url());
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod chart;
pub mod config;
pub mod import;
pub mod logging;
pub mod series;
pub mod station;
pub mod store;

// Re-export top-level types for convenience
pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use cache::{ArtifactCache, ArtifactPath, CacheConfig, CacheError, QueryKey};

pub use chart::{BitmapRenderer, ChartRenderer, RenderError, RenderRequest, TickGranularity};

pub use config::{Config, ConfigError, LoggingConfig};

pub use series::{MeasurementAggregator, MonthlySample, YearRange};

pub use station::{Station, StationDirectory, StationId};

pub use store::{Store, StoreError, StoreResult};
