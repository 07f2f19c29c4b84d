//! Data Transfer Objects
//!
//! Response types for the API endpoints, serialized to JSON.

use serde::{Deserialize, Serialize};

use crate::station::Station;

/// One entry of `GET /stations`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationResponse {
    pub nom: String,
    pub long: f64,
    pub lat: f64,
}

impl From<Station> for StationResponse {
    fn from(station: Station) -> Self {
        Self {
            nom: station.name,
            long: station.longitude,
            lat: station.latitude,
        }
    }
}

/// Chart endpoints response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartResponse {
    /// Chart title
    pub title: String,
    /// Root-relative image URL
    pub img: String,
}
