//! Authentication error types.

use thiserror::Error;

use crate::email::EmailError;
use crate::store::StoreError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] blood_for_nepal_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Reset token unknown, already used or expired.
    #[error("invalid or expired reset token")]
    InvalidResetToken,

    /// Reset email could not be delivered.
    #[error("reset email failed: {0}")]
    Notify(#[from] EmailError),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// Text suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidEmail(_) => "Invalid email address".to_owned(),
            Self::InvalidCredentials => "Invalid email or password".to_owned(),
            Self::UserAlreadyExists => "An account with this email already exists".to_owned(),
            Self::WeakPassword(msg) => msg.clone(),
            Self::InvalidResetToken => "This reset link is invalid or has expired".to_owned(),
            Self::Notify(_) => "We could not send the email. Please try again later.".to_owned(),
            Self::Store(_) | Self::PasswordHash => "Authentication error".to_owned(),
        }
    }
}
