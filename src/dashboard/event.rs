//! Dashboard events

use crate::history::HistoryError;
use crate::model::{Reading, Settings};
use crate::subscription::Delivery;

/// One queued delivery for the dashboard to apply
#[derive(Debug)]
pub enum DashboardEvent {
    /// Latest reading from the live feed
    Live(Delivery<Option<Reading>>),
    /// Current user's settings document
    Settings(Delivery<Option<Settings>>),
    /// The history gate fired: first non-null reading or first error
    FirstLive(Delivery<Reading>),
    /// A history fetch finished
    History {
        request: u64,
        result: Result<Vec<Reading>, HistoryError>,
    },
}

impl DashboardEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DashboardEvent::Live(_) => "live",
            DashboardEvent::Settings(_) => "settings",
            DashboardEvent::FirstLive(_) => "first_live",
            DashboardEvent::History { .. } => "history",
        }
    }
}
