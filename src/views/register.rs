//! Registration screen

use super::FormError;
use crate::router::Route;
use crate::session::{is_valid_email, Session, MIN_PASSWORD_LEN};

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub display_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    error: Option<String>,
}

impl RegisterForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// First failing field check, in form order
    pub fn validate(&self) -> Result<(), FormError> {
        if self.display_name.trim().is_empty() {
            return Err(FormError::Required("Display name"));
        }
        if self.email.trim().is_empty() {
            return Err(FormError::Required("Email"));
        }
        if !is_valid_email(self.email.trim()) {
            return Err(FormError::InvalidEmail);
        }
        if self.password.is_empty() {
            return Err(FormError::Required("Password"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(FormError::PasswordTooShort(MIN_PASSWORD_LEN));
        }
        if self.password != self.confirm_password {
            return Err(FormError::PasswordMismatch);
        }
        Ok(())
    }

    /// Create the account. Invalid forms are rejected before the provider
    /// is contacted.
    pub async fn submit(&mut self, session: &Session) -> Option<Route> {
        self.error = None;

        if let Err(e) = self.validate() {
            self.error = Some(e.to_string());
            return None;
        }

        match session
            .sign_up(self.email.trim(), &self.password, self.display_name.trim())
            .await
        {
            Ok(_) => Some(Route::Dashboard),
            Err(e) => {
                self.error = Some(e.sign_up_message().to_string());
                None
            }
        }
    }
}
