//! Artifact Cache
//!
//! Maps a normalized chart query to the PNG generated for it. The
//! `cache_entries` table is the authoritative index; the filesystem holds the
//! bytes.
//!
//! # States per key
//!
//! ```text
//! Absent ──get_or_materialize──▶ Generating ──entry committed──▶ Present
//!    ▲                               │
//!    └──────── render / store failure (no entry, no file) ◀───────┘
//! ```
//!
//! Concurrent requests for the same absent key wait on a per-key mutex; the
//! first one materializes, the others find the committed entry on re-check.
//! The table's primary key plus `INSERT OR IGNORE` keeps a single row even if
//! another process races us.

mod error;
mod key;

pub use error::{CacheError, CacheResult};
pub use key::{ArtifactPath, QueryKey};

use crate::chart::{ChartRenderer, LabeledSeries, RenderError, RenderRequest, TickGranularity};
use crate::series::{MeasurementAggregator, MAX_YEAR, MIN_YEAR};
use crate::station::StationDirectory;
use crate::store::Store;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;

/// Where artifacts go and how long a render may take
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Static document root
    pub document_root: PathBuf,
    /// Artifact subdirectory, relative to the document root
    pub artifact_dir: String,
    /// Upper bound on a single render
    pub render_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            document_root: PathBuf::from("client"),
            artifact_dir: "courbes".to_string(),
            render_timeout: Duration::from_secs(30),
        }
    }
}

/// Derived-artifact cache for chart queries
pub struct ArtifactCache {
    store: Arc<Store>,
    directory: StationDirectory,
    aggregator: MeasurementAggregator,
    renderer: Arc<dyn ChartRenderer>,
    config: CacheConfig,
    /// Keys currently being materialized
    inflight: InflightMap,
}

type InflightMap = StdMutex<HashMap<QueryKey, Arc<Mutex<()>>>>;

impl ArtifactCache {
    pub fn new(store: Arc<Store>, renderer: Arc<dyn ChartRenderer>, config: CacheConfig) -> Self {
        Self {
            directory: StationDirectory::new(Arc::clone(&store)),
            aggregator: MeasurementAggregator::new(Arc::clone(&store)),
            store,
            renderer,
            config,
            inflight: StdMutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Absolute location of an artifact on disk
    pub fn artifact_file(&self, artifact: &ArtifactPath) -> PathBuf {
        self.config.document_root.join(artifact.as_str())
    }

    /// Stored artifact for `key`, if one was committed
    ///
    /// Never resolves stations or aggregates.
    pub fn lookup(&self, key: &QueryKey) -> CacheResult<Option<ArtifactPath>> {
        let entry = self.store.find_cache_entry(key)?;

        if let Some(entry) = &entry {
            tracing::debug!(key = %key, path = %entry.path, created_at = %entry.created_at, "Cache hit");
        }

        Ok(entry.map(|e| ArtifactPath::new(e.path)))
    }

    /// Return the artifact for `key`, generating it on first request
    pub async fn get_or_materialize(&self, key: &QueryKey) -> CacheResult<ArtifactPath> {
        if let Some(path) = self.lookup(key)? {
            return Ok(path);
        }

        let slot = InflightSlot::join(&self.inflight, key);
        let _guard = slot.gate.lock().await;

        // Another request may have committed while we waited
        match self.lookup(key)? {
            Some(path) => Ok(path),
            None => self.materialize(key).await,
        }
    }

    /// Generate and commit a new artifact for an absent key
    ///
    /// Either both the file and the entry are written, or neither. The
    /// render and commit run in their own task, so dropping the caller
    /// cannot strand a partial file.
    pub async fn materialize(&self, key: &QueryKey) -> CacheResult<ArtifactPath> {
        tracing::info!(key = %key, "Cache miss, materializing chart");

        let range = key.range();
        if !range.is_supported() {
            return Err(CacheError::InvalidRange(format!(
                "{}-{} outside {}..={}",
                range.start, range.end, MIN_YEAR, MAX_YEAR
            )));
        }

        let mut series = Vec::with_capacity(2);

        let primary_id = self.directory.resolve(key.primary())?;
        series.push(LabeledSeries::new(
            key.primary(),
            self.aggregator.build(&primary_id, range)?,
        ));

        if let Some(secondary) = key.secondary() {
            let secondary_id = self.directory.resolve(secondary)?;
            series.push(LabeledSeries::new(
                secondary,
                self.aggregator.build(&secondary_id, range)?,
            ));
        }

        let artifact = ArtifactPath::for_key(&self.config.artifact_dir, key);
        let target = self.artifact_file(&artifact);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let job = RenderJob {
            store: Arc::clone(&self.store),
            renderer: Arc::clone(&self.renderer),
            timeout: self.config.render_timeout,
            key: key.clone(),
            artifact: artifact.clone(),
            request: RenderRequest {
                title: key.title(),
                series,
                range,
                ticks: TickGranularity::for_range(range),
                output: partial_path(&target),
            },
            target,
        };

        match tokio::spawn(job.run()).await {
            Ok(result) => result.map(|()| artifact),
            Err(join) => {
                tracing::error!(key = %key, error = %join, "Materialize task aborted");
                Err(CacheError::Render(RenderError::Draw(join.to_string())))
            }
        }
    }
}

/// Membership of one request in the in-flight map
///
/// Leaves the map on drop, including when the request future is cancelled.
/// The last holder removes the key.
struct InflightSlot<'a> {
    map: &'a InflightMap,
    key: &'a QueryKey,
    gate: Arc<Mutex<()>>,
}

impl<'a> InflightSlot<'a> {
    fn join(map: &'a InflightMap, key: &'a QueryKey) -> Self {
        let mut inflight = map.lock().unwrap_or_else(PoisonError::into_inner);
        let gate = Arc::clone(
            inflight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        );
        Self { map, key, gate }
    }
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        let mut inflight = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map and this request still hold the gate
        if Arc::strong_count(&self.gate) == 2 {
            inflight.remove(self.key);
        }
    }
}

/// Render, rename and commit for one key, detached from the requesting task
struct RenderJob {
    store: Arc<Store>,
    renderer: Arc<dyn ChartRenderer>,
    timeout: Duration,
    key: QueryKey,
    artifact: ArtifactPath,
    request: RenderRequest,
    target: PathBuf,
}

impl RenderJob {
    async fn run(self) -> CacheResult<()> {
        let RenderJob {
            store,
            renderer,
            timeout,
            key,
            artifact,
            request,
            target,
        } = self;
        let partial = request.output.clone();

        if let Err(e) = render(renderer, request, timeout).await {
            remove_quietly(&partial).await;
            return Err(e);
        }

        if let Err(e) = tokio::fs::rename(&partial, &target).await {
            remove_quietly(&partial).await;
            return Err(e.into());
        }

        match store.insert_cache_entry(&key, artifact.as_str()) {
            Ok(true) => {
                tracing::info!(key = %key, path = %artifact, "Committed cache entry");
                Ok(())
            }
            Ok(false) => {
                tracing::warn!(key = %key, path = %artifact, "Cache entry already present, keeping existing row");
                Ok(())
            }
            Err(e) => {
                remove_quietly(&target).await;
                Err(e.into())
            }
        }
    }
}

/// Run the renderer on a blocking thread, bounded by `timeout`
async fn render(
    renderer: Arc<dyn ChartRenderer>,
    request: RenderRequest,
    timeout: Duration,
) -> CacheResult<()> {
    let output = request.output.clone();

    let mut task = tokio::task::spawn_blocking(move || renderer.render(&request));

    let outcome = tokio::time::timeout(timeout, &mut task).await;

    match outcome {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(e))) => {
            tracing::error!(output = ?output, error = %e, "Chart rendering failed");
            Err(CacheError::Render(e))
        }
        Ok(Err(join)) => {
            tracing::error!(output = ?output, error = %join, "Render task aborted");
            Err(CacheError::Render(RenderError::Draw(join.to_string())))
        }
        Err(_) => {
            tracing::error!(output = ?output, timeout_ms = timeout.as_millis() as u64, "Chart rendering timed out");
            // The blocking render cannot be cancelled; drop its output once it ends
            tokio::spawn(async move {
                let _ = task.await;
                remove_quietly(&output).await;
            });
            Err(CacheError::RenderTimeout(timeout))
        }
    }
}

/// Scratch file next to the target; keeps the `.png` extension for the encoder
fn partial_path(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!("{}.partial-{}.png", stem, uuid::Uuid::new_v4()))
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = ?path, error = %e, "Failed to remove artifact file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::testing::RecordingRenderer;
    use crate::store::tests::{measurement, station};
    use tempfile::TempDir;

    struct Fixture {
        cache: Arc<ArtifactCache>,
        store: Arc<Store>,
        renderer: Arc<RecordingRenderer>,
        dir: TempDir,
    }

    fn fixture_with(renderer: RecordingRenderer, render_timeout: Duration) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open_in_memory().unwrap());
        store
            .upsert_stations(&[station("7", "StationX"), station("9", "StationY")])
            .unwrap();
        store
            .upsert_measurements(&[
                measurement("7", "01/03/2012", "10", None),
                measurement("7", "01/03/2013", "5", None),
                measurement("7", "01/04/2014", "0", None),
                measurement("9", "01/06/2013", "12", None),
                measurement("9", "02/06/2013", "500", Some("*")),
            ])
            .unwrap();

        let renderer = Arc::new(renderer);
        let config = CacheConfig {
            document_root: dir.path().to_path_buf(),
            artifact_dir: "courbes".to_string(),
            render_timeout,
        };
        let cache = Arc::new(ArtifactCache::new(
            Arc::clone(&store),
            Arc::clone(&renderer) as Arc<dyn ChartRenderer>,
            config,
        ));

        Fixture {
            cache,
            store,
            renderer,
            dir,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingRenderer::default(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let f = fixture();
        let key = QueryKey::new("StationX", None, 2012, 2014);

        assert!(f.cache.lookup(&key).unwrap().is_none());

        let first = f.cache.get_or_materialize(&key).await.unwrap();
        assert_eq!(first.as_str(), "courbes/pluvio_StationX_2012_2014.png");
        assert_eq!(first.url(), "/courbes/pluvio_StationX_2012_2014.png");
        assert!(f.dir.path().join(first.as_str()).exists());

        let second = f.cache.get_or_materialize(&key).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(f.renderer.calls(), 1);
        assert_eq!(f.cache.lookup(&key).unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_render_request_contents() {
        let f = fixture();
        let key = QueryKey::new("StationX", None, 2012, 2014);
        f.cache.get_or_materialize(&key).await.unwrap();

        let requests = f.renderer.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.title, "Pluviométrie StationX");
        assert_eq!(request.ticks, TickGranularity::Monthly { every: 3 });
        assert_eq!(request.series.len(), 1);

        let points: Vec<(i32, u32, f64)> = request.series[0]
            .samples
            .iter()
            .map(|s| (s.year, s.month, s.depth_mm))
            .collect();
        assert_eq!(points, vec![(2012, 3, 10.0), (2013, 3, 5.0), (2014, 4, 0.0)]);
    }

    #[tokio::test]
    async fn test_compare_renders_two_series() {
        let f = fixture();
        let key = QueryKey::new("StationX", Some("StationY".to_string()), 2011, 2018);

        let path = f.cache.get_or_materialize(&key).await.unwrap();
        assert_eq!(path.as_str(), "courbes/pluvio_StationX_StationY_2011_2018.png");

        let requests = f.renderer.requests.lock().unwrap();
        assert_eq!(requests[0].series.len(), 2);
        assert_eq!(requests[0].series[1].label, "StationY");
        assert_eq!(requests[0].series[1].samples[0].depth_mm, 12.0);
        assert_eq!(requests[0].title, "Pluviométrie StationX - StationY");
    }

    #[tokio::test]
    async fn test_compare_order_is_significant() {
        let f = fixture();
        let ab = QueryKey::new("StationX", Some("StationY".to_string()), 2013, 2013);
        let ba = QueryKey::new("StationY", Some("StationX".to_string()), 2013, 2013);

        let first = f.cache.get_or_materialize(&ab).await.unwrap();
        let second = f.cache.get_or_materialize(&ba).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(f.renderer.calls(), 2);
    }

    #[tokio::test]
    async fn test_unknown_station_leaves_key_absent() {
        let f = fixture();
        let key = QueryKey::new("StationX", Some("Unknown".to_string()), 2012, 2014);

        let err = f.cache.get_or_materialize(&key).await.unwrap_err();
        assert!(matches!(err, CacheError::NotFound(ref name) if name == "Unknown"));
        assert_eq!(f.renderer.calls(), 0);
        assert!(f.cache.lookup(&key).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_series_is_rejected() {
        let f = fixture();
        let key = QueryKey::new("StationY", None, 2015, 2016);

        let err = f.cache.get_or_materialize(&key).await.unwrap_err();
        assert!(matches!(err, CacheError::EmptySeries(_)));
        assert_eq!(f.renderer.calls(), 0);
    }

    #[tokio::test]
    async fn test_render_failure_writes_nothing_and_retries() {
        let f = fixture_with(RecordingRenderer::failing(), Duration::from_secs(5));
        let key = QueryKey::new("StationX", None, 2012, 2014);

        for _ in 0..2 {
            let err = f.cache.get_or_materialize(&key).await.unwrap_err();
            assert!(matches!(err, CacheError::Render(_)));
        }

        assert_eq!(f.renderer.calls(), 2);
        assert_eq!(f.store.count_cache_entries(&key).unwrap(), 0);
        let courbes = f.dir.path().join("courbes");
        assert_eq!(std::fs::read_dir(courbes).unwrap().count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_render_timeout() {
        let f = fixture_with(
            RecordingRenderer::slow(Duration::from_millis(300)),
            Duration::from_millis(20),
        );
        let key = QueryKey::new("StationX", None, 2012, 2014);

        let err = f.cache.get_or_materialize(&key).await.unwrap_err();
        assert!(matches!(err, CacheError::RenderTimeout(_)));
        assert_eq!(f.store.count_cache_entries(&key).unwrap(), 0);
        assert!(!f.dir.path().join("courbes/pluvio_StationX_2012_2014.png").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_coalesce() {
        let f = fixture_with(
            RecordingRenderer::slow(Duration::from_millis(100)),
            Duration::from_secs(5),
        );
        let key = QueryKey::new("StationX", None, 2012, 2014);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&f.cache);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                cache.get_or_materialize(&key).await
            }));
        }

        let mut paths = Vec::new();
        for handle in handles {
            paths.push(handle.await.unwrap().unwrap());
        }

        assert!(paths.iter().all(|p| p == &paths[0]));
        assert_eq!(f.renderer.calls(), 1);
        assert_eq!(f.store.count_cache_entries(&key).unwrap(), 1);
        assert!(f.cache.inflight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_range_is_rejected_before_rendering() {
        let f = fixture();

        for (start, end) in [(1, 100_000_000), (i32::MIN, i32::MAX), (0, 2012)] {
            let key = QueryKey::new("StationX", None, start, end);
            let err = f.cache.get_or_materialize(&key).await.unwrap_err();
            assert!(matches!(err, CacheError::InvalidRange(_)), "{}-{}", start, end);
        }

        assert_eq!(f.renderer.calls(), 0);
        assert!(!f.dir.path().join("courbes").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dropped_request_leaves_no_partial_file() {
        let f = fixture_with(
            RecordingRenderer::slow(Duration::from_millis(200)),
            Duration::from_secs(5),
        );
        let key = QueryKey::new("StationX", None, 2012, 2014);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(30), f.cache.get_or_materialize(&key)).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(500)).await;

        let names: Vec<String> = std::fs::read_dir(f.dir.path().join("courbes"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| !n.contains(".partial-")), "{:?}", names);

        // The detached render finished the job: file and entry both exist
        assert_eq!(names, vec!["pluvio_StationX_2012_2014.png".to_string()]);
        assert_eq!(f.store.count_cache_entries(&key).unwrap(), 1);
        assert!(f.cache.inflight.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dropped_failing_request_writes_nothing() {
        let f = fixture_with(
            RecordingRenderer {
                delay: Some(Duration::from_millis(100)),
                fail: true,
                ..Default::default()
            },
            Duration::from_secs(5),
        );
        let key = QueryKey::new("StationX", None, 2012, 2014);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), f.cache.get_or_materialize(&key)).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(std::fs::read_dir(f.dir.path().join("courbes")).unwrap().count(), 0);
        assert_eq!(f.store.count_cache_entries(&key).unwrap(), 0);
    }

    #[test]
    fn test_partial_path_keeps_png_extension() {
        let partial = partial_path(Path::new("/srv/courbes/pluvio_A_2011_2018.png"));
        let name = partial.file_name().unwrap().to_string_lossy().into_owned();

        assert!(name.starts_with("pluvio_A_2011_2018.partial-"));
        assert!(name.ends_with(".png"));
        assert_eq!(partial.parent(), Some(Path::new("/srv/courbes")));
    }
}
