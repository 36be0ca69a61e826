//! In-process authentication provider
//!
//! Accounts live in memory. Passwords are kept as salted SHA-256 digests.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

use super::error::{AuthError, AuthErrorCode};
use super::AuthProvider;
use crate::model::{Identity, User};

/// Shortest password accepted at sign-up
pub const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    user: User,
    salt: String,
    digest: String,
}

/// Authentication provider holding accounts in memory
pub struct LocalAuthProvider {
    /// Normalised email → account
    accounts: RwLock<HashMap<String, Account>>,
    current: watch::Sender<Option<User>>,
}

impl LocalAuthProvider {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            accounts: RwLock::new(HashMap::new()),
            current,
        }
    }

    /// Number of registered accounts
    pub async fn account_count(&self) -> usize {
        self.accounts.read().await.len()
    }
}

impl Default for LocalAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = normalize_email(email)?;

        let accounts = self.accounts.read().await;
        let account = accounts.get(&email).ok_or_else(|| {
            AuthError::new(AuthErrorCode::UserNotFound, format!("no account for {}", email))
        })?;

        if digest(&account.salt, password) != account.digest {
            return Err(AuthError::new(
                AuthErrorCode::WrongPassword,
                "password does not match",
            ));
        }

        let user = account.user.clone();
        drop(accounts);

        self.current.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<User, AuthError> {
        let email = normalize_email(email)?;

        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::new(
                AuthErrorCode::WeakPassword,
                format!("password shorter than {} characters", MIN_PASSWORD_LEN),
            ));
        }

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&email) {
            return Err(AuthError::new(
                AuthErrorCode::EmailAlreadyInUse,
                format!("{} is already registered", email),
            ));
        }

        let display_name = display_name.trim();
        let user = User {
            identity: Identity::new(Uuid::new_v4().simple().to_string()),
            email: email.clone(),
            display_name: (!display_name.is_empty()).then(|| display_name.to_string()),
        };

        let salt = Uuid::new_v4().to_string();
        let account = Account {
            user: user.clone(),
            digest: digest(&salt, password),
            salt,
        };
        accounts.insert(email, account);
        drop(accounts);

        self.current.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.current.send_replace(None);
        Ok(())
    }

    fn watch_identity(&self) -> watch::Receiver<Option<User>> {
        self.current.subscribe()
    }
}

/// Lower-case, trimmed, and shaped like an address
fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    if is_valid_email(&email) {
        Ok(email)
    } else {
        Err(AuthError::new(
            AuthErrorCode::InvalidEmail,
            format!("'{}' is not an email address", email),
        ))
    }
}

/// One `@`, something before it, a dotted domain after it, no whitespace
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_up_signs_in() {
        let provider = LocalAuthProvider::new();
        let identity = provider.watch_identity();

        let user = provider
            .sign_up("Grower@Example.com ", "secret1", "Grace")
            .await
            .unwrap();

        assert_eq!(user.email, "grower@example.com");
        assert_eq!(user.display_name.as_deref(), Some("Grace"));
        assert_eq!(identity.borrow().as_ref(), Some(&user));
        assert_eq!(provider.account_count().await, 1);
    }

    #[tokio::test]
    async fn test_sign_in_errors() {
        let provider = LocalAuthProvider::new();
        provider.sign_up("a@farm.io", "secret1", "A").await.unwrap();
        provider.sign_out().await.unwrap();

        let err = provider.sign_in("b@farm.io", "secret1").await.unwrap_err();
        assert_eq!(err.code, AuthErrorCode::UserNotFound);

        let err = provider.sign_in("a@farm.io", "nope!!").await.unwrap_err();
        assert_eq!(err.code, AuthErrorCode::WrongPassword);

        let err = provider.sign_in("not-an-email", "secret1").await.unwrap_err();
        assert_eq!(err.code, AuthErrorCode::InvalidEmail);

        assert!(provider.watch_identity().borrow().is_none());

        let user = provider.sign_in("A@farm.io", "secret1").await.unwrap();
        assert_eq!(provider.watch_identity().borrow().as_ref(), Some(&user));
    }

    #[tokio::test]
    async fn test_sign_up_errors() {
        let provider = LocalAuthProvider::new();
        provider.sign_up("a@farm.io", "secret1", "A").await.unwrap();

        let err = provider.sign_up("a@farm.io", "secret2", "A2").await.unwrap_err();
        assert_eq!(err.code, AuthErrorCode::EmailAlreadyInUse);

        let err = provider.sign_up("c@farm.io", "12345", "C").await.unwrap_err();
        assert_eq!(err.code, AuthErrorCode::WeakPassword);
    }

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("x@y.z"));
        assert!(!is_valid_email("x@y"));
        assert!(!is_valid_email("@y.z"));
        assert!(!is_valid_email("x y@z.io"));
        assert!(!is_valid_email("x@@z.io"));
        assert!(!is_valid_email("x@.io"));
    }

    #[test]
    fn test_digest_depends_on_salt() {
        assert_ne!(digest("a", "pw"), digest("b", "pw"));
        assert_eq!(digest("a", "pw"), digest("a", "pw"));
    }
}
