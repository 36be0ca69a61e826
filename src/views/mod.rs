//! Form Views
//!
//! Login, registration and farm settings screens, modelled as plain state
//! plus async submit handlers. Each handler returns the route to navigate
//! to, if any.

mod login;
mod register;
mod settings;

pub use login::LoginForm;
pub use register::RegisterForm;
pub use settings::{validate_settings, SettingsView, SETTINGS_LOAD_PREFIX, SETTINGS_SAVED, SETTINGS_SAVE_PREFIX};

use thiserror::Error;

/// Client-side validation failures. A form with one never reaches the
/// provider or the store.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Password must be at least {0} characters")]
    PasswordTooShort(usize),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
    },

    #[error("Minimum soil moisture cannot exceed the maximum")]
    ThresholdOrder,
}
