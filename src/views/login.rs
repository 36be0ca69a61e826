//! Login screen

use crate::router::Route;
use crate::session::Session;

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    error: Option<String>,
    submitting: bool,
}

impl LoginForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Sign in. On success the dashboard is next; on failure the error is
    /// shown and nothing navigates.
    pub async fn submit(&mut self, session: &Session) -> Option<Route> {
        self.error = None;
        self.submitting = true;
        let result = session.sign_in(&self.email, &self.password).await;
        self.submitting = false;

        match result {
            Ok(_) => Some(Route::Dashboard),
            Err(e) => {
                self.error = Some(e.sign_in_message().to_string());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::User;
    use crate::session::{AuthError, AuthErrorCode, AuthProvider, LocalAuthProvider};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::watch;

    /// Provider that always fails with one code
    struct Rejecting {
        code: &'static str,
        current: watch::Sender<Option<User>>,
    }

    impl Rejecting {
        fn new(code: &'static str) -> Self {
            Self {
                code,
                current: watch::channel(None).0,
            }
        }
    }

    #[async_trait]
    impl AuthProvider for Rejecting {
        async fn sign_in(&self, _: &str, _: &str) -> Result<User, AuthError> {
            Err(AuthError::new(AuthErrorCode::parse(self.code), "rejected"))
        }

        async fn sign_up(&self, _: &str, _: &str, _: &str) -> Result<User, AuthError> {
            Err(AuthError::new(AuthErrorCode::parse(self.code), "rejected"))
        }

        async fn sign_out(&self) -> Result<(), AuthError> {
            Ok(())
        }

        fn watch_identity(&self) -> watch::Receiver<Option<User>> {
            self.current.subscribe()
        }
    }

    fn form(email: &str, password: &str) -> LoginForm {
        LoginForm {
            email: email.to_string(),
            password: password.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_success_navigates_to_dashboard() {
        let provider = Arc::new(LocalAuthProvider::new());
        provider.sign_up("pat@farm.ca", "secret1", "Pat").await.unwrap();
        provider.sign_out().await.unwrap();
        let session = Session::new(provider);

        let mut login = form("pat@farm.ca", "secret1");
        assert_eq!(login.submit(&session).await, Some(Route::Dashboard));
        assert!(login.error().is_none());
        assert!(session.is_signed_in());
    }

    #[tokio::test]
    async fn test_each_code_shows_its_message() {
        let cases = [
            ("auth/user-not-found", "No account found with that email."),
            ("auth/wrong-password", "Incorrect password."),
            ("auth/invalid-email", "Invalid email address."),
            ("auth/too-many-requests", "Login failed. Please try again."),
        ];

        for (code, message) in cases {
            let session = Session::new(Arc::new(Rejecting::new(code)));
            let mut login = form("pat@farm.ca", "whatever");
            assert_eq!(login.submit(&session).await, None, "{code}");
            assert_eq!(login.error(), Some(message), "{code}");
            assert!(!login.is_submitting());
        }
    }

    #[tokio::test]
    async fn test_local_provider_errors_map_to_messages() {
        let provider = Arc::new(LocalAuthProvider::new());
        provider.sign_up("pat@farm.ca", "secret1", "Pat").await.unwrap();
        let session = Session::new(provider);

        let mut login = form("pat@farm.ca", "wrong-one");
        assert_eq!(login.submit(&session).await, None);
        assert_eq!(login.error(), Some("Incorrect password."));

        login.email = "nobody@farm.ca".to_string();
        assert_eq!(login.submit(&session).await, None);
        assert_eq!(login.error(), Some("No account found with that email."));

        login.email = "not-an-email".to_string();
        assert_eq!(login.submit(&session).await, None);
        assert_eq!(login.error(), Some("Invalid email address."));
    }

    #[tokio::test]
    async fn test_submit_clears_previous_error() {
        let provider = Arc::new(LocalAuthProvider::new());
        provider.sign_up("pat@farm.ca", "secret1", "Pat").await.unwrap();
        let session = Session::new(provider);

        let mut login = form("pat@farm.ca", "wrong-one");
        login.submit(&session).await;
        assert!(login.error().is_some());

        login.password = "secret1".to_string();
        assert_eq!(login.submit(&session).await, Some(Route::Dashboard));
        assert!(login.error().is_none());
    }
}
