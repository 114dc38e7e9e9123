//! Persisted weather entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a new coordinate.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A city or location with its forecast series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Region {
    /// Server-side city id (natural key; 0 when unknown).
    pub sid: i64,
    /// Display name.
    pub name: Option<String>,
    /// ISO country code.
    pub country: Option<String>,
    /// Latitude reported by the server.
    pub latitude: f64,
    /// Longitude reported by the server.
    pub longitude: f64,
    /// Marks the singleton region that follows the device location.
    pub is_current: bool,
    /// Forecast entries in server order.
    pub forecasts: Vec<Forecast>,
}

impl Region {
    /// Coordinate of the region.
    #[must_use]
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// One forecast sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// Midnight (UTC) of the sample's day.
    pub day: DateTime<Utc>,
    /// Sample time.
    pub time: DateTime<Utc>,
    /// Temperature in degrees Celsius.
    pub temp: f64,
    /// Wind speed in metres per second.
    pub wind_speed: f64,
    /// Wind direction in degrees.
    pub wind_deg: f64,
    /// Weather icon code.
    pub icon: Option<String>,
}

/// Opaque, session-independent identifier of a persisted region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef(Uuid);

impl EntityRef {
    /// Allocates a fresh reference.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
