//! Session & Authentication
//!
//! The authentication provider is an external collaborator behind the
//! [`AuthProvider`] trait. A [`Session`] is the explicitly passed handle views
//! use to reach it: there is no global "current user".
//!
//! [`LocalAuthProvider`] is an in-process provider with the same error
//! taxonomy, used by the binaries and the tests.

mod error;
mod local;

pub use error::{AuthError, AuthErrorCode, SIGN_IN_FALLBACK, SIGN_UP_FALLBACK};
pub use local::{is_valid_email, LocalAuthProvider, MIN_PASSWORD_LEN};

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

use crate::model::{Settings, User};
use crate::store::SettingsStore;
use crate::subscription::{self, Sink, Subscription};

/// Issues and validates credentials
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Sign in with email and password; the user becomes current
    async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError>;

    /// Create an account, set its display name, and sign it in
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<User, AuthError>;

    /// Forget the current user
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// The current user, as a reactive value
    fn watch_identity(&self) -> watch::Receiver<Option<User>>;
}

/// Handle to the authentication provider, passed to every view that needs it
#[derive(Clone)]
pub struct Session {
    provider: Arc<dyn AuthProvider>,
}

impl Session {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self { provider }
    }

    /// Currently signed-in user, if any
    pub fn current_user(&self) -> Option<User> {
        self.provider.watch_identity().borrow().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.current_user().is_some()
    }

    /// Reactive current user
    pub fn identity(&self) -> watch::Receiver<Option<User>> {
        self.provider.watch_identity()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let result = self.provider.sign_in(email, password).await;
        match &result {
            Ok(user) => tracing::info!(user_id = %user.identity, "Signed in"),
            Err(e) => tracing::warn!(error = %e, "Sign-in failed"),
        }
        result
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<User, AuthError> {
        let result = self.provider.sign_up(email, password, display_name).await;
        match &result {
            Ok(user) => tracing::info!(user_id = %user.identity, "Account created"),
            Err(e) => tracing::warn!(error = %e, "Sign-up failed"),
        }
        result
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.provider.sign_out().await?;
        tracing::info!("Signed out");
        Ok(())
    }

    /// Follow the current user's settings document.
    ///
    /// Re-subscribes whenever the signed-in user changes; delivers `None`
    /// while nobody is signed in.
    pub fn watch_settings(
        &self,
        store: Arc<dyn SettingsStore>,
        sink: Sink<Option<Settings>>,
    ) -> Subscription {
        subscription::switch_map(self.identity(), sink, move |user: &User, sink| {
            store.subscribe_settings(&user.identity, sink)
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.current_user())
            .finish()
    }
}
