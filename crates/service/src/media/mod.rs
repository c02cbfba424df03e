//! Profile picture uploads.
//!
//! [`MediaHost`] is the narrow contract to the image host: an unsigned,
//! preset-based upload and a signed upload using server-held credentials.
//! [`MediaUploader`] applies the upload policy on top of it: unsigned first,
//! signed on any failure, cancellable throughout.

pub mod cloudinary;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use blood_for_nepal_core::UserId;

pub use cloudinary::CloudinaryClient;

/// Errors that can occur when uploading an image.
#[derive(Debug, Error)]
pub enum UploadError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Host answered with an error status.
    #[error("Upload rejected: {status} - {message}")]
    Rejected { status: u16, message: String },

    /// Host answered success without a secure URL.
    #[error("Upload response did not include a secure URL")]
    MissingUrl,

    /// Host returned a URL that does not parse.
    #[error("Invalid image URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Image file could not be read.
    #[error("Could not read image: {0}")]
    Io(#[from] std::io::Error),

    /// The caller cancelled the upload.
    #[error("Upload cancelled")]
    Cancelled,
}

impl UploadError {
    /// Text suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Cancelled => "Upload cancelled".to_owned(),
            Self::Rejected { message, .. } => format!("Image upload failed: {message}"),
            Self::Io(_) => "Could not read the selected image".to_owned(),
            Self::Http(_) | Self::MissingUrl | Self::InvalidUrl(_) => {
                "Image upload failed. Please check your connection and try again.".to_owned()
            }
        }
    }
}

/// An image ready to upload.
#[derive(Clone)]
pub struct ImageSource {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

impl std::fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageSource")
            .field("bytes", &self.bytes.len())
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .finish()
    }
}

impl ImageSource {
    #[must_use]
    pub fn new(
        bytes: Vec<u8>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            content_type: content_type.into(),
        }
    }

    /// Read an image file, guessing the content type from its extension.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Io` if the file cannot be read.
    pub async fn from_path(path: &Path) -> Result<Self, UploadError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map_or_else(|| "image".to_owned(), |n| n.to_string_lossy().into_owned());
        Ok(Self::new(bytes, file_name, content_type_for(path)))
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}

/// Object key for an owner's upload: `{owner}_{unix_millis}`.
#[must_use]
pub fn object_key(owner: UserId) -> String {
    format!("{owner}_{}", Utc::now().timestamp_millis())
}

/// The image host.
#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Upload through the unsigned preset.
    async fn upload_unsigned(&self, image: &ImageSource, owner: UserId)
    -> Result<Url, UploadError>;

    /// Upload signed with the server-held API secret.
    async fn upload_signed(&self, image: &ImageSource, owner: UserId) -> Result<Url, UploadError>;
}

/// Applies the unsigned-then-signed upload policy.
#[derive(Clone)]
pub struct MediaUploader {
    host: Arc<dyn MediaHost>,
}

impl MediaUploader {
    #[must_use]
    pub fn new(host: Arc<dyn MediaHost>) -> Self {
        Self { host }
    }

    /// Upload `image` for `owner` and return its secure URL.
    ///
    /// Tries the unsigned preset first and falls back to a signed upload on
    /// any failure. Cancelling `cancel` drops the in-flight request; a
    /// cancelled unsigned attempt does not fall back.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Cancelled` if cancelled, otherwise the signed
    /// attempt's error when both attempts fail.
    #[tracing::instrument(skip(self, image, cancel), fields(size = image.bytes.len()))]
    pub async fn upload(
        &self,
        image: &ImageSource,
        owner: UserId,
        cancel: &CancellationToken,
    ) -> Result<Url, UploadError> {
        match until_cancelled(cancel, self.host.upload_unsigned(image, owner)).await {
            Ok(url) => return Ok(url),
            Err(UploadError::Cancelled) => return Err(UploadError::Cancelled),
            Err(e) => {
                tracing::warn!(error = %e, "Unsigned upload failed, trying signed upload");
                let owner_id = owner.to_string();
                crate::error::add_breadcrumb(
                    "upload",
                    "Unsigned upload failed",
                    Some(&[("owner", owner_id.as_str())]),
                );
            }
        }

        let url = until_cancelled(cancel, self.host.upload_signed(image, owner)).await?;
        tracing::info!("Signed upload succeeded");
        Ok(url)
    }
}

async fn until_cancelled(
    cancel: &CancellationToken,
    attempt: impl Future<Output = Result<Url, UploadError>>,
) -> Result<Url, UploadError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(UploadError::Cancelled),
        result = attempt => result,
    }
}
