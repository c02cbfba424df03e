//! Integration tests for Blood for Nepal.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory tests
//! cargo test -p blood-for-nepal-integration-tests
//!
//! # Including the PostgreSQL tests (needs BFN_TEST_DATABASE_URL)
//! cargo test -p blood-for-nepal-integration-tests -- --include-ignored
//! ```
//!
//! # Test Categories
//!
//! - `session` - Sign-up, sign-in, password reset, profile photo
//! - `requests_donors` - Request and donor lists across controllers
//! - `postgres` - Store contracts against a real database

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use blood_for_nepal_core::{Email, UserId};
use blood_for_nepal_service::AppState;
use blood_for_nepal_service::email::{EmailError, ResetNotifier};
use blood_for_nepal_service::media::{ImageSource, MediaHost, UploadError};

/// Keeps reset tokens instead of emailing them.
#[derive(Debug, Default)]
pub struct Outbox {
    sent: Mutex<Vec<(String, String)>>,
}

impl Outbox {
    /// The last token sent to `email`.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn last_token_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, token)| token.clone())
    }
}

#[async_trait]
impl ResetNotifier for Outbox {
    #[allow(clippy::unwrap_used)]
    async fn send_reset(&self, to: &Email, token: &str) -> Result<(), EmailError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), token.to_owned()));
        Ok(())
    }
}

/// Media host whose unsigned preset can be switched off.
#[derive(Debug)]
pub struct FakeMediaHost {
    unsigned_works: bool,
    delay: Duration,
    signed_calls: AtomicUsize,
}

impl FakeMediaHost {
    #[must_use]
    pub const fn new(unsigned_works: bool) -> Self {
        Self {
            unsigned_works,
            delay: Duration::ZERO,
            signed_calls: AtomicUsize::new(0),
        }
    }

    /// Make every upload take `delay`.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn signed_calls(&self) -> usize {
        self.signed_calls.load(Ordering::SeqCst)
    }

    fn url(kind: &str, owner: UserId) -> Result<Url, UploadError> {
        Ok(Url::parse(&format!(
            "https://res.cloudinary.test/{kind}/blood_for_nepal/profiles/{owner}.jpg"
        ))?)
    }
}

#[async_trait]
impl MediaHost for FakeMediaHost {
    async fn upload_unsigned(
        &self,
        _image: &ImageSource,
        owner: UserId,
    ) -> Result<Url, UploadError> {
        tokio::time::sleep(self.delay).await;
        if self.unsigned_works {
            Self::url("unsigned", owner)
        } else {
            Err(UploadError::Rejected {
                status: 400,
                message: "Upload preset not found".to_owned(),
            })
        }
    }

    async fn upload_signed(&self, _image: &ImageSource, owner: UserId) -> Result<Url, UploadError> {
        tokio::time::sleep(self.delay).await;
        self.signed_calls.fetch_add(1, Ordering::SeqCst);
        Self::url("signed", owner)
    }
}

/// In-memory backends plus handles on the fakes.
pub struct TestContext {
    pub state: AppState,
    pub outbox: Arc<Outbox>,
    pub media: Arc<FakeMediaHost>,
}

impl TestContext {
    /// Fresh in-memory state whose media host rejects unsigned uploads when
    /// `unsigned_works` is false.
    #[must_use]
    pub fn new(unsigned_works: bool) -> Self {
        Self::with_media(FakeMediaHost::new(unsigned_works))
    }

    /// Fresh in-memory state over `media`.
    #[must_use]
    pub fn with_media(media: FakeMediaHost) -> Self {
        let outbox = Arc::new(Outbox::default());
        let media = Arc::new(media);
        let state = AppState::in_memory(outbox.clone(), Some(media.clone()));
        Self {
            state,
            outbox,
            media,
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new(true)
    }
}
