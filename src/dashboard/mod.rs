//! Dashboard
//!
//! Orchestrates everything on the dashboard screen:
//!
//! - the live feed's latest reading
//! - the signed-in user's settings (drives the map)
//! - one history fetch, gated on the first live reading
//! - four charts and the farm map
//!
//! ## Lifecycle
//!
//! ```text
//! Dashboard::new(ctx)
//!     │ activate()     open live + settings subscriptions
//!     │ attach(surface) create map, gate the history fetch
//!     │ step() / process_pending()  apply queued deliveries
//!     │ deactivate()   cancel everything, remove map, destroy charts
//! ```
//!
//! Subscription callbacks never touch view state directly: they enqueue a
//! [`DashboardEvent`] and the view applies events one at a time on its own
//! task.

mod event;
mod view;

pub use event::DashboardEvent;
pub use view::{Dashboard, DashboardState, Phase};

use std::sync::Arc;

use crate::chart::ChartBackend;
use crate::history::HistorySource;
use crate::map::MapBackend;
use crate::session::Session;
use crate::store::{ReadingFeed, SettingsStore};

/// Readings fetched from history unless configured otherwise
pub const DEFAULT_HISTORY_COUNT: u32 = 24;

pub const LIVE_ERROR_PREFIX: &str = "Live data error: ";
pub const SETTINGS_ERROR_PREFIX: &str = "Cannot load user settings: ";

/// Collaborators the dashboard reads from
#[derive(Clone)]
pub struct DashboardContext {
    pub session: Session,
    pub feed: Arc<dyn ReadingFeed>,
    pub settings: Arc<dyn SettingsStore>,
    pub history: Arc<dyn HistorySource>,
    /// Readings requested from history
    pub history_count: u32,
}

impl DashboardContext {
    pub fn new(
        session: Session,
        feed: Arc<dyn ReadingFeed>,
        settings: Arc<dyn SettingsStore>,
        history: Arc<dyn HistorySource>,
    ) -> Self {
        Self {
            session,
            feed,
            settings,
            history,
            history_count: DEFAULT_HISTORY_COUNT,
        }
    }

    pub fn with_history_count(mut self, count: u32) -> Self {
        self.history_count = count;
        self
    }
}

/// Rendering targets handed over once the screen is laid out
pub struct Surface {
    pub map: Box<dyn MapBackend>,
    pub charts: Box<dyn ChartBackend>,
}

impl Surface {
    pub fn new(map: impl MapBackend + 'static, charts: impl ChartBackend + 'static) -> Self {
        Self {
            map: Box::new(map),
            charts: Box::new(charts),
        }
    }
}
