//! Authentication errors
//!
//! Providers report failures as short codes (`auth/user-not-found`, ...).
//! Views never show those codes; they show the fixed sentence for the code,
//! or a generic fallback for anything unrecognised.

use thiserror::Error;

/// Known authentication failure codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorCode {
    UserNotFound,
    WrongPassword,
    InvalidEmail,
    EmailAlreadyInUse,
    WeakPassword,
    Other,
}

impl AuthErrorCode {
    /// Parse a provider code; unknown codes map to `Other`
    pub fn parse(code: &str) -> Self {
        match code.trim_start_matches("auth/") {
            "user-not-found" => AuthErrorCode::UserNotFound,
            "wrong-password" => AuthErrorCode::WrongPassword,
            "invalid-email" => AuthErrorCode::InvalidEmail,
            "email-already-in-use" => AuthErrorCode::EmailAlreadyInUse,
            "weak-password" => AuthErrorCode::WeakPassword,
            _ => AuthErrorCode::Other,
        }
    }

    /// Provider-style code string
    pub fn as_code(&self) -> &'static str {
        match self {
            AuthErrorCode::UserNotFound => "auth/user-not-found",
            AuthErrorCode::WrongPassword => "auth/wrong-password",
            AuthErrorCode::InvalidEmail => "auth/invalid-email",
            AuthErrorCode::EmailAlreadyInUse => "auth/email-already-in-use",
            AuthErrorCode::WeakPassword => "auth/weak-password",
            AuthErrorCode::Other => "auth/internal-error",
        }
    }

    /// Fixed user-facing sentence, if this code has one
    pub fn message(&self) -> Option<&'static str> {
        match self {
            AuthErrorCode::UserNotFound => Some("No account found with that email."),
            AuthErrorCode::WrongPassword => Some("Incorrect password."),
            AuthErrorCode::InvalidEmail => Some("Invalid email address."),
            AuthErrorCode::EmailAlreadyInUse => Some("An account with that email already exists."),
            AuthErrorCode::WeakPassword => Some("Password should be at least 6 characters."),
            AuthErrorCode::Other => None,
        }
    }
}

/// Fallback shown when a sign-in fails for an unrecognised reason
pub const SIGN_IN_FALLBACK: &str = "Login failed. Please try again.";

/// Fallback shown when a sign-up fails for an unrecognised reason
pub const SIGN_UP_FALLBACK: &str = "Registration failed. Please try again.";

/// Authentication failure reported by a provider
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{} ({detail})", .code.as_code())]
pub struct AuthError {
    pub code: AuthErrorCode,
    /// Provider's own description, for logs
    pub detail: String,
}

impl AuthError {
    pub fn new(code: AuthErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }

    /// Message for the login form
    pub fn sign_in_message(&self) -> &'static str {
        self.code.message().unwrap_or(SIGN_IN_FALLBACK)
    }

    /// Message for the registration form
    pub fn sign_up_message(&self) -> &'static str {
        self.code.message().unwrap_or(SIGN_UP_FALLBACK)
    }
}
