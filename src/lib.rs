//! # Farmwatch
//!
//! Farm weather monitoring: a live feed of weather readings, a bounded
//! history fetch, four charts, a farm map, and per-user farm settings.
//!
//! ## Modules
//!
//! - [`model`]: readings, settings, identities
//! - [`subscription`]: cancellable push subscriptions
//! - [`store`]: SQLite document store (readings feed + settings documents)
//! - [`session`]: authentication boundary and the signed-in session
//! - [`history`]: REST client for past readings
//! - [`dashboard`]: the dashboard view and its lifecycle
//! - [`chart`] / [`map`]: drawing surfaces driven by the dashboard
//! - [`views`] / [`router`]: forms and guarded navigation
//! - [`api`] / [`websocket`]: the backend service
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use farmwatch::store::DocumentStore;
//! use farmwatch::model::Reading;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::open("farmwatch.db")?;
//!
//!     store.append_reading(Reading::new(
//!         chrono::Utc::now().timestamp_millis(),
//!         21.5,
//!         60.0,
//!         1013.0,
//!         3.4,
//!         "clear sky",
//!     ))?;
//!
//!     println!("{} readings stored", store.reading_count()?);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod chart;
pub mod config;
pub mod dashboard;
pub mod history;
pub mod logging;
pub mod map;
pub mod model;
pub mod router;
pub mod session;
pub mod store;
pub mod subscription;
pub mod views;
pub mod websocket;

#[cfg(test)]
mod testing;

// Re-export top-level types for convenience
pub use model::{Identity, LatLng, Reading, Settings, User};

pub use subscription::{Delivery, Sink, Subscription};

pub use store::{DocumentStore, ReadingFeed, SettingsStore, StoreError, StoreResult};

pub use session::{AuthError, AuthErrorCode, AuthProvider, LocalAuthProvider, Session};

pub use history::{HistoryClient, HistoryConfig, HistoryError, HistorySource};

pub use dashboard::{Dashboard, DashboardContext, DashboardState, Phase, Surface};

pub use chart::{ChartBackend, ChartMetric, Charts, SvgCanvas};

pub use map::{FarmMap, MapBackend, MapState};

pub use router::{Resolution, Route, Router};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{ApiConfig, Config, ConfigError, LoggingConfig};
