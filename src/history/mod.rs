//! History API
//!
//! One-shot bounded fetch of past readings from the backend service, which
//! is separate from the live feed's storage.
//!
//! - [`HistorySource`]: the boundary the dashboard depends on
//! - [`HistoryClient`]: `reqwest` implementation against
//!   `GET {base}/readings/recent?limit=N`

mod client;

pub use client::{decode_envelope, HistoryClient, HistoryConfig, HistoryError, HISTORY_ERROR_PREFIX};

use async_trait::async_trait;

use crate::model::Reading;

/// Source of historical readings
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// The `limit` most recent readings, oldest first. One request, no retry.
    async fn fetch_recent(&self, limit: u32) -> Result<Vec<Reading>, HistoryError>;
}
