//! Domain types shared by every layer
//!
//! - `Reading`: one weather observation
//! - `Settings`: per-user farm configuration
//! - `Identity` / `User`: who is signed in

mod identity;
mod reading;
mod settings;

pub use identity::{Identity, User};
pub use reading::{into_ascending, is_ascending, Reading};
pub use settings::{
    AlertPreferences, IrrigationThresholds, LatLng, Settings, DEFAULT_FARM_LOCATION,
};
