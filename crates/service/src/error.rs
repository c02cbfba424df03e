//! Unified error handling with Sentry integration.
//!
//! Every fallible service operation returns [`ServiceError`]. Controllers
//! turn it into the text shown to the user with [`ServiceError::user_message`],
//! which never exposes database or transport internals.

use thiserror::Error;

use blood_for_nepal_core::ValidationError;

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::email::EmailError;
use crate::media::UploadError;
use crate::store::StoreError;

/// Service-level error type.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input rejected before any store call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Media upload failed.
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Configuration is missing or invalid.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Outgoing email failed.
    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    /// The operation needs a signed-in user.
    #[error("Not signed in")]
    NotSignedIn,

    /// The signed-in user does not own the document being changed.
    #[error("Not the owner of this {0}")]
    NotOwner(&'static str),

    /// An operation was dropped before it finished.
    #[error("Operation cancelled")]
    Cancelled,

    /// Media uploads are not configured.
    #[error("Photo uploads are not configured")]
    UploadsDisabled,
}

impl ServiceError {
    /// Text suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.to_string(),
            Self::Auth(err) => err.user_message(),
            Self::Store(StoreError::NotFound { collection, .. }) => {
                format!("The requested {collection} record no longer exists")
            }
            Self::Store(StoreError::Conflict(msg)) => msg.clone(),
            Self::Store(_) => {
                "Something went wrong saving your changes. Please try again.".to_owned()
            }
            Self::Upload(err) => err.user_message(),
            Self::Config(_) | Self::UploadsDisabled => {
                "This feature is not available right now".to_owned()
            }
            Self::Email(_) => "We could not send the email. Please try again later.".to_owned(),
            Self::NotSignedIn => "Please sign in to continue".to_owned(),
            Self::NotOwner(collection) => format!("You can only change your own {collection}"),
            Self::Cancelled => "Operation cancelled".to_owned(),
        }
    }

    /// Whether this error points at a fault on our side rather than bad input.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::Database(_) | StoreError::DataCorruption(_))
                | Self::Config(_)
                | Self::Email(_)
                | Self::Auth(AuthError::PasswordHash | AuthError::Store(_) | AuthError::Notify(_))
        )
    }

    /// Report internal errors to Sentry and log them.
    ///
    /// Input errors (validation, wrong password, conflicts) are only logged
    /// at `debug`.
    pub fn report(&self) {
        if self.is_internal() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Service error"
            );
        } else {
            tracing::debug!(error = %self, "Operation rejected");
        }
    }
}

/// Result type alias for `ServiceError`.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_passes_through() {
        let err = ServiceError::from(ValidationError::MissingFields(vec!["Name", "City"]));
        assert_eq!(
            err.user_message(),
            "Please fill all required fields: Name, City"
        );
        assert!(!err.is_internal());
    }

    #[test]
    fn test_database_error_is_hidden() {
        let err = ServiceError::from(StoreError::Database(sqlx::Error::PoolTimedOut));
        assert!(!err.user_message().contains("pool"));
        assert!(err.is_internal());
    }

    #[test]
    fn test_conflict_message_is_shown() {
        let err = ServiceError::from(StoreError::Conflict(
            "This record was changed by someone else".to_owned(),
        ));
        assert_eq!(err.user_message(), "This record was changed by someone else");
        assert!(!err.is_internal());
    }

    #[test]
    fn test_not_signed_in_message() {
        assert_eq!(
            ServiceError::NotSignedIn.user_message(),
            "Please sign in to continue"
        );
    }

    #[test]
    fn test_not_owner_names_collection() {
        let err = ServiceError::NotOwner("blood requests");
        assert_eq!(
            err.user_message(),
            "You can only change your own blood requests"
        );
        assert!(!err.is_internal());
    }
}
