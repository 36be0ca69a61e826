//! Data Transfer Objects
//!
//! Every body uses the `{status, data}` / `{status, message}` envelope the
//! history client unwraps.

use serde::{Deserialize, Serialize};

/// Query string of `GET /api/readings/recent`
#[derive(Debug, Default, Deserialize)]
pub struct RecentParams {
    /// Kept as text so a malformed value falls back to the default
    #[serde(default)]
    pub limit: Option<String>,
}

/// Success envelope carrying data
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub status: &'static str,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            data,
        }
    }
}

/// Success envelope carrying a message
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub status: &'static str,
    pub message: String,
}

impl MessageResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            message: message.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// healthy or unhealthy
    pub status: String,
    /// Document store status
    pub store: String,
    /// Stored readings
    pub readings: usize,
    /// Open live feed subscriptions (WebSocket clients)
    pub live_subscriptions: usize,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}
