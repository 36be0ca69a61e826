//! Document Store
//!
//! The two data boundaries the dashboard reads from:
//!
//! - [`ReadingFeed`]: append-only weather readings. Reactive "latest reading"
//!   subscription plus a one-shot "most recent N" fetch.
//! - [`SettingsStore`]: one settings document per identity. Reactive read,
//!   point read, merge-write.
//!
//! [`DocumentStore`] implements both on SQLite, pushing changes to
//! subscribers through `tokio::sync::watch` channels.
//!
//! Lists returned by any method here are ascending by timestamp.

mod document;
mod error;
mod merge;

pub use document::DocumentStore;
pub use error::{StoreError, StoreResult};
pub use merge::merge_into;

use async_trait::async_trait;

use crate::model::{Identity, Reading, Settings};
use crate::subscription::{self, Sink, Subscription};

/// Source of weather readings
#[async_trait]
pub trait ReadingFeed: Send + Sync {
    /// Subscribe to the newest reading. The sink first receives the current
    /// newest reading (`None` while the collection is empty), then every
    /// newer one.
    fn subscribe_latest(&self, sink: Sink<Option<Reading>>) -> Subscription;

    /// The `limit` most recent readings, oldest first
    async fn recent(&self, limit: usize) -> StoreResult<Vec<Reading>>;

    /// Open latest-reading subscriptions
    fn live_subscriptions(&self) -> usize;
}

/// Per-user settings documents
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Subscribe to one user's settings. `None` while no document exists.
    fn subscribe_settings(&self, identity: &Identity, sink: Sink<Option<Settings>>)
        -> Subscription;

    /// Point read
    async fn get_settings(&self, identity: &Identity) -> StoreResult<Option<Settings>>;

    /// Merge `settings` into the stored document (creating it if needed),
    /// stamp `updated_ts`, and return the merged result.
    async fn merge_settings(&self, identity: &Identity, settings: &Settings)
        -> StoreResult<Settings>;

    /// Open settings subscriptions
    fn settings_subscriptions(&self) -> usize;
}

/// One-shot listener: delivers the first non-null reading (or the first
/// error) and then closes itself.
pub fn first_reading(feed: &dyn ReadingFeed, sink: Sink<Reading>) -> Subscription {
    subscription::first_matching(|s| feed.subscribe_latest(s), |r: Option<Reading>| r, sink)
}
