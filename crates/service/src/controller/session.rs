//! Session: the signed-in user, their profile and profile photo.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use blood_for_nepal_core::UserProfile;
use blood_for_nepal_core::validation::SignUpDraft;

use super::{Action, ControllerError, StateStore, ViewState};
use crate::auth::{AuthProvider, Principal};
use crate::error::ServiceError;
use crate::media::{ImageSource, MediaUploader};
use crate::store::ProfileStore;

/// Data behind the session screens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionData {
    pub principal: Option<Principal>,
    pub profile: Option<UserProfile>,
}

impl SessionData {
    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        self.principal.is_some()
    }
}

/// Signs users in and out and maintains their profile.
pub struct SessionController {
    auth: Arc<dyn AuthProvider>,
    profiles: Arc<dyn ProfileStore>,
    uploader: Option<MediaUploader>,
    state: StateStore<SessionData>,
}

impl SessionController {
    #[must_use]
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        profiles: Arc<dyn ProfileStore>,
        uploader: Option<MediaUploader>,
    ) -> Self {
        Self {
            auth,
            profiles,
            uploader,
            state: StateStore::new(),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ViewState<SessionData>> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> ViewState<SessionData> {
        self.state.snapshot()
    }

    /// Pick up a principal the auth provider already holds and load its
    /// profile. Leaves the state signed out when there is none.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Busy` while another call is loading, or the
    /// profile store's error.
    pub async fn restore(&self) -> Result<Option<UserProfile>, ControllerError> {
        let principal = self.auth.current();
        self.state
            .run(
                async {
                    match &principal {
                        Some(p) => Ok(Some(self.profiles.get(p.user_id).await?)),
                        None => Ok(None),
                    }
                },
                |data, profile| {
                    data.principal.clone_from(&principal);
                    data.profile.clone_from(profile);
                    None
                },
            )
            .await
    }

    /// Sign in and load the user's profile.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Busy` while another call is loading, or the
    /// auth or store error.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, ControllerError> {
        let (principal, profile) = self
            .state
            .run(
                async {
                    let principal = self.auth.sign_in(email, password).await?;
                    let profile = self.profiles.get(principal.user_id).await?;
                    Ok((principal, profile))
                },
                |data, (principal, profile)| {
                    data.principal = Some(principal.clone());
                    data.profile = Some(profile.clone());
                    None
                },
            )
            .await?;
        tracing::info!(user_id = %principal.user_id, "Signed in");
        Ok(profile)
    }

    /// Create an account and save its profile with the names, email and
    /// phone from the form.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Busy` while another call is loading, the
    /// form's validation error, or the auth or store error.
    pub async fn sign_up(&self, draft: SignUpDraft) -> Result<UserProfile, ControllerError> {
        let (_, profile) = self
            .state
            .run(
                async {
                    let sign_up = draft.validate()?;
                    let principal = self.auth.sign_up(&sign_up.email, &sign_up.password).await?;

                    let mut profile = UserProfile::blank(principal.user_id);
                    profile.first_name = sign_up.first_name;
                    profile.last_name = sign_up.last_name;
                    profile.email = sign_up.email.into_inner();
                    profile.phone_number = sign_up.phone_number;
                    let profile = self.profiles.save(&profile).await?;

                    Ok((principal, profile))
                },
                |data, (principal, profile)| {
                    data.principal = Some(principal.clone());
                    data.profile = Some(profile.clone());
                    Some("Account created successfully".to_owned())
                },
            )
            .await?;
        Ok(profile)
    }

    /// Sign out and forget the profile.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Busy` while another call is loading.
    pub async fn sign_out(&self) -> Result<(), ControllerError> {
        self.state
            .run(
                async {
                    self.auth.sign_out().await;
                    Ok(())
                },
                |data, ()| {
                    *data = SessionData::default();
                    None
                },
            )
            .await
    }

    /// Email a password-reset link.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Busy` while another call is loading, or the
    /// auth provider's error.
    pub async fn send_password_reset(&self, email: &str) -> Result<(), ControllerError> {
        self.state
            .run(
                async { Ok(self.auth.send_password_reset(email).await?) },
                |_, ()| Some("Password reset email sent successfully".to_owned()),
            )
            .await
    }

    /// Set a new password with a reset token.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Busy` while another call is loading, or the
    /// auth provider's error.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), ControllerError> {
        self.state
            .run(
                async { Ok(self.auth.reset_password(token, new_password).await?) },
                |_, ()| Some("Password updated. You can sign in now.".to_owned()),
            )
            .await
    }

    /// Save an edited profile of the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Busy` while another call is loading,
    /// `ServiceError::NotSignedIn` when `profile` is not the signed-in
    /// user's, or the store's error (a conflict when `profile` is stale).
    pub async fn update_profile(
        &self,
        profile: UserProfile,
    ) -> Result<UserProfile, ControllerError> {
        let principal = self.auth.current();
        self.state
            .run(
                async {
                    if principal.as_ref().is_none_or(|p| p.user_id != profile.id) {
                        return Err(ServiceError::NotSignedIn);
                    }
                    Ok(self.profiles.update(&profile).await?)
                },
                |data, saved| {
                    data.profile = Some(saved.clone());
                    Some("Profile updated successfully".to_owned())
                },
            )
            .await
    }

    /// Upload a new profile photo and store its URL on the profile.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Busy` while another call is loading,
    /// `ServiceError::NotSignedIn` without a loaded profile,
    /// `ServiceError::UploadsDisabled` without a media host, or the upload or
    /// store error. A cancelled upload leaves the profile unchanged.
    pub async fn upload_profile_photo(
        &self,
        image: &ImageSource,
        cancel: &CancellationToken,
    ) -> Result<UserProfile, ControllerError> {
        let current = self.state.data().profile;
        self.state
            .run(
                async {
                    let mut profile = current.ok_or(ServiceError::NotSignedIn)?;
                    let uploader = self.uploader.as_ref().ok_or(ServiceError::UploadsDisabled)?;

                    let url = uploader.upload(image, profile.id, cancel).await?;
                    profile.profile_picture = url.into();
                    Ok(self.profiles.update(&profile).await?)
                },
                |data, saved| {
                    data.profile = Some(saved.clone());
                    Some("Profile picture updated".to_owned())
                },
            )
            .await
    }

    /// Dismiss the current error.
    pub fn clear_error(&self) {
        let _ = self.state.dispatch(Action::ClearError);
    }

    /// Dismiss the current message.
    pub fn clear_message(&self) {
        let _ = self.state.dispatch(Action::ClearMessage);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use url::Url;

    use blood_for_nepal_core::{Email, UserId};

    use super::*;
    use crate::auth::PasswordAuthProvider;
    use crate::email::{EmailError, ResetNotifier};
    use crate::media::{MediaHost, UploadError};
    use crate::store::memory::MemoryBackend;

    struct NoopNotifier;

    #[async_trait]
    impl ResetNotifier for NoopNotifier {
        async fn send_reset(&self, _to: &Email, _token: &str) -> Result<(), EmailError> {
            Ok(())
        }
    }

    struct SignedOnlyHost;

    #[async_trait]
    impl MediaHost for SignedOnlyHost {
        async fn upload_unsigned(
            &self,
            _image: &ImageSource,
            _owner: UserId,
        ) -> Result<Url, UploadError> {
            Err(UploadError::MissingUrl)
        }

        async fn upload_signed(
            &self,
            _image: &ImageSource,
            owner: UserId,
        ) -> Result<Url, UploadError> {
            Ok(Url::parse(&format!("https://img.test/{owner}.jpg")).unwrap())
        }
    }

    fn controller(uploads: bool) -> SessionController {
        let backend = Arc::new(MemoryBackend::new());
        let auth = Arc::new(PasswordAuthProvider::new(
            backend.clone(),
            Arc::new(NoopNotifier),
        ));
        let uploader = uploads.then(|| MediaUploader::new(Arc::new(SignedOnlyHost)));
        SessionController::new(auth, backend, uploader)
    }

    fn draft() -> SignUpDraft {
        SignUpDraft {
            email: "ram@example.com".to_owned(),
            password: "password123".to_owned(),
            confirm_password: "password123".to_owned(),
            first_name: "Ram".to_owned(),
            last_name: "Thapa".to_owned(),
            phone_number: "9800000000".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_sign_up_saves_profile() {
        let session = controller(false);
        let profile = session.sign_up(draft()).await.unwrap();
        assert_eq!(profile.full_name(), "Ram Thapa");
        assert_eq!(profile.email, "ram@example.com");

        let state = session.snapshot();
        assert!(state.data.is_signed_in());
        assert_eq!(state.data.profile, Some(profile));
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_sign_up_mismatched_passwords_sets_error() {
        let session = controller(false);
        let mut bad = draft();
        bad.confirm_password = "password124".to_owned();

        assert!(session.sign_up(bad).await.is_err());
        let state = session.snapshot();
        assert!(!state.data.is_signed_in());
        assert!(state.error.is_some());
    }

    #[tokio::test]
    async fn test_sign_out_then_sign_in_loads_profile() {
        let session = controller(false);
        session.sign_up(draft()).await.unwrap();
        session.sign_out().await.unwrap();
        assert_eq!(session.snapshot().data, SessionData::default());

        let profile = session.sign_in("ram@example.com", "password123").await.unwrap();
        assert_eq!(profile.first_name, "Ram");
    }

    #[tokio::test]
    async fn test_bad_credentials_message() {
        let session = controller(false);
        assert!(session.sign_in("ram@example.com", "nope-nope").await.is_err());
        assert_eq!(
            session.snapshot().error.as_deref(),
            Some("Invalid email or password")
        );

        session.clear_error();
        assert!(session.snapshot().error.is_none());
    }

    #[tokio::test]
    async fn test_update_profile_requires_own_profile() {
        let session = controller(false);
        session.sign_up(draft()).await.unwrap();

        let stranger = UserProfile::blank(UserId::generate());
        let err = session.update_profile(stranger).await.unwrap_err();
        assert!(matches!(
            err,
            ControllerError::Service(ServiceError::NotSignedIn)
        ));
    }

    #[tokio::test]
    async fn test_update_profile_sets_message() {
        let session = controller(false);
        let mut profile = session.sign_up(draft()).await.unwrap();
        profile.city = "Pokhara".to_owned();

        let saved = session.update_profile(profile).await.unwrap();
        assert_eq!(saved.city, "Pokhara");
        let state = session.snapshot();
        assert_eq!(state.message.as_deref(), Some("Profile updated successfully"));
        assert_eq!(state.data.profile, Some(saved));
    }

    #[tokio::test]
    async fn test_upload_photo_stores_url() {
        let session = controller(true);
        let profile = session.sign_up(draft()).await.unwrap();

        let image = ImageSource::new(vec![1, 2, 3], "me.jpg", "image/jpeg");
        let saved = session
            .upload_profile_photo(&image, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            saved.profile_picture,
            format!("https://img.test/{}.jpg", profile.id)
        );
        assert!(saved.updated_at > profile.updated_at);
    }

    #[tokio::test]
    async fn test_upload_without_host_is_disabled() {
        let session = controller(false);
        session.sign_up(draft()).await.unwrap();

        let image = ImageSource::new(vec![1], "me.jpg", "image/jpeg");
        let err = session
            .upload_profile_photo(&image, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ControllerError::Service(ServiceError::UploadsDisabled)
        ));
    }
}
