//! Wiring of stores, auth and media into controllers.

use std::sync::Arc;

use blood_for_nepal_core::{BloodType, UserId};

use crate::auth::{AuthProvider, PasswordAuthProvider};
use crate::config::ServiceConfig;
use crate::controller::{
    DonationsController, DonorsController, RequestsController, SessionController,
};
use crate::db::{
    AccountRepository, DonationRepository, DonorRepository, ProfileRepository, RequestRepository,
};
use crate::email::{EmailError, EmailService, LogNotifier, ResetNotifier};
use crate::error::Result;
use crate::media::{CloudinaryClient, MediaHost, MediaUploader};
use crate::store::memory::MemoryBackend;
use crate::store::{DonationStore, DonorStore, ProfileStore, RequestStore, StoreError};

/// Shared backends. Cheaply cloneable via `Arc`; every controller created
/// from one state sees the same stores and the same signed-in principal.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    profiles: Arc<dyn ProfileStore>,
    requests: Arc<dyn RequestStore>,
    donors: Arc<dyn DonorStore>,
    donations: Arc<dyn DonationStore>,
    auth: Arc<dyn AuthProvider>,
    uploader: Option<MediaUploader>,
}

impl AppState {
    /// Connect to `PostgreSQL` and the configured external services.
    ///
    /// Reset emails go over SMTP when configured and are logged otherwise.
    /// Photo uploads are disabled without Cloudinary credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable or the SMTP relay or
    /// HTTP client cannot be built.
    pub async fn connect(config: &ServiceConfig) -> Result<Self> {
        let pool = crate::db::create_pool(&config.database_url)
            .await
            .map_err(StoreError::from)?;

        let notifier: Arc<dyn ResetNotifier> = match &config.email {
            Some(email) => Arc::new(
                EmailService::new(email, config.base_url.clone()).map_err(EmailError::from)?,
            ),
            None => {
                tracing::warn!("SMTP not configured; password reset links will only be logged");
                Arc::new(LogNotifier::new(config.base_url.clone()))
            }
        };

        let uploader = match &config.cloudinary {
            Some(cfg) => {
                let client = CloudinaryClient::new(cfg.clone())?;
                Some(MediaUploader::new(Arc::new(client)))
            }
            None => {
                tracing::warn!("Cloudinary not configured; profile photo uploads are disabled");
                None
            }
        };

        let auth = PasswordAuthProvider::new(
            Arc::new(AccountRepository::new(pool.clone())),
            notifier,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                profiles: Arc::new(ProfileRepository::new(pool.clone())),
                requests: Arc::new(RequestRepository::new(pool.clone())),
                donors: Arc::new(DonorRepository::new(pool.clone())),
                donations: Arc::new(DonationRepository::new(pool)),
                auth: Arc::new(auth),
                uploader,
            }),
        })
    }

    /// Everything in memory. Reset tokens go to `notifier`; photo uploads go
    /// to `media` when given.
    #[must_use]
    pub fn in_memory(
        notifier: Arc<dyn ResetNotifier>,
        media: Option<Arc<dyn MediaHost>>,
    ) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let auth = PasswordAuthProvider::new(backend.clone(), notifier);

        Self {
            inner: Arc::new(AppStateInner {
                profiles: backend.clone(),
                requests: backend.clone(),
                donors: backend.clone(),
                donations: backend,
                auth: Arc::new(auth),
                uploader: media.map(MediaUploader::new),
            }),
        }
    }

    #[must_use]
    pub fn session(&self) -> SessionController {
        SessionController::new(
            self.inner.auth.clone(),
            self.inner.profiles.clone(),
            self.inner.uploader.clone(),
        )
    }

    #[must_use]
    pub fn requests(&self) -> RequestsController {
        RequestsController::new(self.inner.requests.clone())
    }

    #[must_use]
    pub fn donors(&self) -> DonorsController {
        DonorsController::new(self.inner.donors.clone())
    }

    #[must_use]
    pub fn donations(&self) -> DonationsController {
        DonationsController::new(self.inner.donations.clone())
    }

    /// Profile ids of active users with `blood_type`, optionally in `city`.
    ///
    /// # Errors
    ///
    /// Returns the profile store's error.
    pub async fn search_donor_ids(
        &self,
        blood_type: BloodType,
        city: Option<&str>,
    ) -> Result<Vec<UserId>> {
        Ok(self.inner.profiles.search_donor_ids(blood_type, city).await?)
    }
}
