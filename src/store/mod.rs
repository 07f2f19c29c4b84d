//! SQLite Store
//!
//! Single database holding the reference data and the chart cache index:
//!
//! - **stations**: one row per rain gauge (identifier, display name, coordinates)
//! - **measurements**: one row per station per day, station identifier as a column value
//! - **cache_entries**: query key → artifact path, append-only
//!
//! The connection is opened once by the process and shared as `Arc<Store>`.
//! All statements are static; station identifiers are bound parameters.

mod error;

pub use error::{StoreError, StoreResult};

use crate::cache::QueryKey;
use crate::station::Station;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Flag value marking a measurement as invalid
pub const INVALID_FLAG: &str = "*";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS stations (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        longitude REAL NOT NULL,
        latitude REAL NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_stations_name ON stations(name);

    CREATE TABLE IF NOT EXISTS measurements (
        station_id TEXT NOT NULL,
        date TEXT NOT NULL,
        value TEXT NOT NULL DEFAULT '',
        flag TEXT,
        PRIMARY KEY (station_id, date)
    );

    CREATE TABLE IF NOT EXISTS cache_entries (
        station TEXT NOT NULL,
        station2 TEXT NOT NULL DEFAULT '',
        start_year INTEGER NOT NULL,
        end_year INTEGER NOT NULL,
        path TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (station, station2, start_year, end_year)
    );
";

/// One raw daily sample as imported from the gauge network export
#[derive(Debug, Clone, PartialEq)]
pub struct RawMeasurement {
    pub station_id: String,
    /// `DD/MM/YYYY`
    pub date: String,
    /// Depth in mm as text; empty means 0.0
    pub value: String,
    pub flag: Option<String>,
}

/// Persisted mapping from a query key to a generated artifact
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub path: String,
    pub created_at: String,
}

/// Shared handle to the SQLite database
pub struct Store {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) the database file and make sure the schema exists
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StoreError::Unavailable(format!("{}: {}", path.display(), e)))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;

        let store = Self {
            conn: Mutex::new(conn),
            path: Some(path),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Private in-memory database, used by tests and benches
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Database file location (`None` for in-memory stores)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init_schema(&self) -> StoreResult<()> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }

    // ============================================
    // STATIONS
    // ============================================

    /// All stations, ordered by display name
    pub fn list_stations(&self) -> StoreResult<Vec<Station>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, name, longitude, latitude FROM stations ORDER BY name, id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(Station {
                id: row.get(0)?,
                name: row.get(1)?,
                longitude: row.get(2)?,
                latitude: row.get(3)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Identifier of the first station carrying this display name
    pub fn find_station_id(&self, name: &str) -> StoreResult<Option<String>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare_cached("SELECT id FROM stations WHERE name = ?1 ORDER BY rowid LIMIT 1")?;

        stmt.query_row(params![name], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }

    /// Insert or replace a batch of stations in one transaction
    pub fn upsert_stations(&self, stations: &[Station]) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO stations (id, name, longitude, latitude)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;

            for station in stations {
                stmt.execute(params![
                    station.id,
                    station.name,
                    station.longitude,
                    station.latitude
                ])?;
            }
        }

        tx.commit()?;
        Ok(stations.len())
    }

    // ============================================
    // MEASUREMENTS
    // ============================================

    /// Insert or replace a batch of raw measurements in one transaction
    pub fn upsert_measurements(&self, measurements: &[RawMeasurement]) -> StoreResult<usize> {
        if measurements.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO measurements (station_id, date, value, flag)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;

            for m in measurements {
                stmt.execute(params![m.station_id, m.date, m.value, m.flag])?;
            }
        }

        tx.commit()?;
        Ok(measurements.len())
    }

    /// Per-month totals for one station, keyed by the `MM/YYYY` part of the date
    ///
    /// Invalid rows are excluded. Empty values count as 0.0. Row order is
    /// whatever SQLite returns; callers sort.
    pub fn monthly_totals(&self, station_id: &str) -> StoreResult<Vec<(String, f64)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT SUBSTR(date, 4, 7) AS month,
                    TOTAL(CASE WHEN TRIM(value) = '' THEN 0.0 ELSE CAST(value AS REAL) END)
             FROM measurements
             WHERE station_id = ?1 AND IFNULL(flag, '') != ?2
             GROUP BY month",
        )?;

        let rows = stmt.query_map(params![station_id, INVALID_FLAG], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ============================================
    // CACHE ENTRIES
    // ============================================

    /// Exact match on all four key fields
    pub fn find_cache_entry(&self, key: &QueryKey) -> StoreResult<Option<CacheEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT path, created_at FROM cache_entries
             WHERE station = ?1 AND station2 = ?2 AND start_year = ?3 AND end_year = ?4",
        )?;

        stmt.query_row(
            params![key.primary(), key.secondary_or_empty(), key.start(), key.end()],
            |row| {
                Ok(CacheEntry {
                    path: row.get(0)?,
                    created_at: row.get(1)?,
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }

    /// Record a new artifact for a key
    ///
    /// Returns `false` when a row for the key already existed; the existing row wins.
    pub fn insert_cache_entry(&self, key: &QueryKey, path: &str) -> StoreResult<bool> {
        let created_at = chrono::Utc::now().to_rfc3339();
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO cache_entries
                (station, station2, start_year, end_year, path, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                key.primary(),
                key.secondary_or_empty(),
                key.start(),
                key.end(),
                path,
                created_at
            ],
        )?;

        Ok(inserted == 1)
    }

    /// Number of cache rows for a key (at most one)
    pub fn count_cache_entries(&self, key: &QueryKey) -> StoreResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cache_entries
             WHERE station = ?1 AND station2 = ?2 AND start_year = ?3 AND end_year = ?4",
            params![key.primary(), key.secondary_or_empty(), key.start(), key.end()],
            |row| row.get(0),
        )?;

        Ok(count as u64)
    }
}
