//! Sensor readings
//!
//! A `Reading` is one weather observation as published by the field station.
//! Field names match the JSON the station publishes, so readings round-trip
//! through the document store and the history API unchanged.

use serde::{Deserialize, Serialize};

/// A single timestamped weather observation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    /// Unix timestamp in milliseconds (station clock)
    pub timestamp: i64,
    /// Air temperature (°C)
    pub owm_temp: f64,
    /// Relative humidity (%)
    pub owm_humidity: f64,
    /// Air pressure (hPa)
    pub owm_pressure: f64,
    /// Wind speed (m/s)
    pub owm_wind_speed: f64,
    /// Short weather summary, e.g. "clear sky"
    pub owm_weather: String,
    /// When the backend received the reading (ms since epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_received_ts: Option<i64>,
}

impl Reading {
    /// Create a reading without a server receive stamp
    pub fn new(
        timestamp: i64,
        temp: f64,
        humidity: f64,
        pressure: f64,
        wind_speed: f64,
        weather: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            owm_temp: temp,
            owm_humidity: humidity,
            owm_pressure: pressure,
            owm_wind_speed: wind_speed,
            owm_weather: weather.into(),
            server_received_ts: None,
        }
    }

    /// Builder method: stamp the server receive time
    pub fn received_at(mut self, ts: i64) -> Self {
        self.server_received_ts = Some(ts);
        self
    }

    /// All numeric fields are finite
    pub fn is_finite(&self) -> bool {
        self.owm_temp.is_finite()
            && self.owm_humidity.is_finite()
            && self.owm_pressure.is_finite()
            && self.owm_wind_speed.is_finite()
    }
}

/// Put readings into canonical (ascending by timestamp) order.
///
/// The sort is stable, so readings sharing a timestamp keep their source order.
pub fn into_ascending(mut readings: Vec<Reading>) -> Vec<Reading> {
    readings.sort_by_key(|r| r.timestamp);
    readings
}

/// Check the canonical ordering invariant
pub fn is_ascending(readings: &[Reading]) -> bool {
    readings.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
}
