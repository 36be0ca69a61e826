//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use super::error::{ApiError, ApiResult};
use crate::config::ApiConfig;
use crate::store::{DocumentStore, StoreResult};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Readings and settings documents
    pub store: Arc<DocumentStore>,
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(store: Arc<DocumentStore>, config: ApiConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Run a store call on the blocking pool, off the async workers
    pub async fn with_store<T, F>(&self, f: F) -> ApiResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&DocumentStore) -> StoreResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| ApiError::Internal(format!("store task failed: {}", e)))?
            .map_err(ApiError::from)
    }
}
