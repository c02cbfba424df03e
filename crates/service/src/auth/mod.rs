//! Authentication service.
//!
//! [`AuthProvider`] is the contract the session controller signs users in
//! through; [`PasswordAuthProvider`] implements it with argon2 password
//! hashes kept in an [`AccountStore`].

mod error;

pub use error::AuthError;

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::TimeDelta;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tracing::instrument;

use blood_for_nepal_core::{Email, UserId, now_micros};

use crate::email::{RESET_LINK_VALID_MINUTES, ResetNotifier};
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::store::{AccountStore, StoreError};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Random bytes in a password-reset token.
const RESET_TOKEN_BYTES: usize = 32;

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub email: Email,
}

/// Email + password authentication with a single current principal.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Create an account and sign it in.
    async fn sign_up(&self, email: &Email, password: &str) -> Result<Principal, AuthError>;

    /// Check credentials and sign the account in.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AuthError>;

    /// Forget the current principal.
    async fn sign_out(&self);

    /// The signed-in user, if any.
    fn current(&self) -> Option<Principal>;

    /// Email a password-reset link. Unknown addresses succeed silently.
    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError>;

    /// Complete a reset: consume `token` and set `new_password`.
    async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError>;
}

/// Password authentication over an [`AccountStore`].
pub struct PasswordAuthProvider {
    accounts: Arc<dyn AccountStore>,
    notifier: Arc<dyn ResetNotifier>,
    current: watch::Sender<Option<Principal>>,
}

impl PasswordAuthProvider {
    /// Create a new password auth provider.
    #[must_use]
    pub fn new(accounts: Arc<dyn AccountStore>, notifier: Arc<dyn ResetNotifier>) -> Self {
        Self {
            accounts,
            notifier,
            current: watch::Sender::new(None),
        }
    }

    fn set_current(&self, principal: Principal) {
        set_sentry_user(&principal.user_id, Some(principal.email.as_str()));
        self.current.send_replace(Some(principal));
    }
}

#[async_trait]
impl AuthProvider for PasswordAuthProvider {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_up(&self, email: &Email, password: &str) -> Result<Principal, AuthError> {
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let account = self
            .accounts
            .create_account(email, &password_hash)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Store(other),
            })?;

        tracing::info!(user_id = %account.user_id, "Account created");
        let principal = Principal {
            user_id: account.user_id,
            email: account.email,
        };
        self.set_current(principal.clone());
        Ok(principal)
    }

    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        let email = Email::parse(email)?;

        let account = self
            .accounts
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &account.password_hash)?;

        let principal = Principal {
            user_id: account.user_id,
            email: account.email,
        };
        self.set_current(principal.clone());
        Ok(principal)
    }

    async fn sign_out(&self) {
        if self.current.send_replace(None).is_some() {
            tracing::info!("Signed out");
        }
        clear_sentry_user();
    }

    fn current(&self) -> Option<Principal> {
        self.current.borrow().clone()
    }

    #[instrument(skip(self))]
    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let email = Email::parse(email)?;

        let Some(account) = self.accounts.find_by_email(&email).await? else {
            // Same outcome as a known address, so accounts cannot be probed.
            tracing::info!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = generate_reset_token();
        let expires_at = now_micros() + TimeDelta::minutes(RESET_LINK_VALID_MINUTES);
        self.accounts
            .insert_reset_token(account.user_id, &hash_reset_token(&token), expires_at)
            .await?;

        self.notifier.send_reset(&account.email, &token).await?;
        Ok(())
    }

    #[instrument(skip(self, token, new_password))]
    async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        validate_password(new_password)?;

        let user_id = self
            .accounts
            .consume_reset_token(&hash_reset_token(token.trim()), now_micros())
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        let password_hash = hash_password(new_password)?;
        self.accounts
            .set_password_hash(user_id, &password_hash)
            .await?;

        tracing::info!(user_id = %user_id, "Password reset completed");
        Ok(())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Validate password requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Random URL-safe reset token.
fn generate_reset_token() -> String {
    let bytes: [u8; RESET_TOKEN_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Only the hash of a reset token is stored.
fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::email::EmailError;
    use crate::store::memory::MemoryBackend;

    /// Captures tokens instead of sending them.
    #[derive(Default)]
    struct CapturingNotifier {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ResetNotifier for CapturingNotifier {
        async fn send_reset(&self, to: &Email, token: &str) -> Result<(), EmailError> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), token.to_owned()));
            Ok(())
        }
    }

    fn provider() -> (PasswordAuthProvider, Arc<CapturingNotifier>) {
        let notifier = Arc::new(CapturingNotifier::default());
        let provider = PasswordAuthProvider::new(Arc::new(MemoryBackend::new()), notifier.clone());
        (provider, notifier)
    }

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[test]
    fn test_reset_token_is_url_safe() {
        let token = generate_reset_token();
        assert_eq!(token.len(), 43);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_eq!(hash_reset_token(&token).len(), 64);
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let (auth, _) = provider();
        let created = auth
            .sign_up(&email("ram@example.com"), "password123")
            .await
            .unwrap();
        assert_eq!(auth.current(), Some(created.clone()));

        auth.sign_out().await;
        assert!(auth.current().is_none());

        let signed_in = auth.sign_in("RAM@example.com", "password123").await.unwrap();
        assert_eq!(signed_in.user_id, created.user_id);
    }

    #[tokio::test]
    async fn test_duplicate_sign_up_rejected() {
        let (auth, _) = provider();
        auth.sign_up(&email("ram@example.com"), "password123")
            .await
            .unwrap();
        let err = auth
            .sign_up(&email("ram@example.com"), "password456")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists));
    }

    #[tokio::test]
    async fn test_wrong_password_leaves_signed_out() {
        let (auth, _) = provider();
        auth.sign_up(&email("ram@example.com"), "password123")
            .await
            .unwrap();
        auth.sign_out().await;

        let err = auth.sign_in("ram@example.com", "password124").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(auth.current().is_none());
    }

    #[tokio::test]
    async fn test_reset_for_unknown_email_is_silent() {
        let (auth, notifier) = provider();
        auth.send_password_reset("nobody@example.com").await.unwrap();
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let (auth, notifier) = provider();
        auth.sign_up(&email("sita@example.com"), "old-password")
            .await
            .unwrap();
        auth.sign_out().await;

        auth.send_password_reset("sita@example.com").await.unwrap();
        let token = notifier.sent.lock().unwrap()[0].1.clone();

        auth.reset_password(&token, "new-password").await.unwrap();
        assert!(auth.sign_in("sita@example.com", "new-password").await.is_ok());
        assert!(matches!(
            auth.reset_password(&token, "another-password").await,
            Err(AuthError::InvalidResetToken)
        ));
    }
}
