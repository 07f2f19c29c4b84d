//! Station Directory
//!
//! Resolves gauge display names to their internal identifiers. Station rows are
//! reference data written by the import tool; the directory only reads them.

use crate::store::{Store, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A rain-gauge station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Stable internal key
    pub id: String,
    /// Unique display name, used as the external handle
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
}

/// Internal station identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StationId(String);

impl StationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directory lookup failures
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Station not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Read-only view over the stations table
#[derive(Clone)]
pub struct StationDirectory {
    store: Arc<Store>,
}

impl StationDirectory {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Resolve a display name to its identifier
    ///
    /// Names are assumed unique; if the data source holds duplicates the
    /// first imported row wins.
    pub fn resolve(&self, name: &str) -> Result<StationId, DirectoryError> {
        match self.store.find_station_id(name)? {
            Some(id) => {
                tracing::debug!(station = %name, station_id = %id, "Resolved station");
                Ok(StationId(id))
            }
            None => {
                tracing::warn!(station = %name, "Unknown station name");
                Err(DirectoryError::NotFound(name.to_string()))
            }
        }
    }

    /// Every known station
    pub fn list(&self) -> Result<Vec<Station>, DirectoryError> {
        Ok(self.store.list_stations()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::station;

    fn directory() -> StationDirectory {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_stations(&[station("12", "Bron"), station("40", "Vaulx-en-Velin")])
            .unwrap();
        StationDirectory::new(Arc::new(store))
    }

    #[test]
    fn test_resolve_known_station() {
        let dir = directory();
        assert_eq!(dir.resolve("Vaulx-en-Velin").unwrap(), StationId::new("40"));
    }

    #[test]
    fn test_resolve_unknown_station() {
        let dir = directory();
        let err = dir.resolve("Unknown").unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound(ref name) if name == "Unknown"));
        assert_eq!(err.to_string(), "Station not found: Unknown");
    }

    #[test]
    fn test_list_contains_each_name_once() {
        let dir = directory();
        let stations = dir.list().unwrap();

        for name in ["Bron", "Vaulx-en-Velin"] {
            assert_eq!(stations.iter().filter(|s| s.name == name).count(), 1);
        }
    }
}
