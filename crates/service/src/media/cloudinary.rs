//! Cloudinary upload API client.
//!
//! Uploads go to `POST {api_base}/v1_1/{cloud_name}/image/upload` as
//! multipart forms. Signed requests carry a SHA-1 signature over the sorted
//! parameters followed by the API secret.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tracing::instrument;
use url::Url;

use blood_for_nepal_core::UserId;

use super::{ImageSource, MediaHost, UploadError, object_key};
use crate::config::CloudinaryConfig;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Cloudinary API client.
#[derive(Clone)]
pub struct CloudinaryClient {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryClient {
    /// Create a new Cloudinary client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: CloudinaryConfig) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("blood-for-nepal/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> Result<Url, UploadError> {
        Ok(self
            .config
            .api_base
            .join(&format!("v1_1/{}/{path}", self.config.cloud_name))?)
    }

    /// Check that the credentials are accepted.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Rejected` if the host refuses the credentials.
    #[instrument(skip(self), fields(cloud = %self.config.cloud_name))]
    pub async fn ping(&self) -> Result<(), UploadError> {
        let response = self
            .client
            .get(self.endpoint("ping")?)
            .basic_auth(
                &self.config.api_key,
                Some(self.config.api_secret.expose_secret()),
            )
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rejected(status.as_u16(), &body));
        }

        tracing::info!("Cloudinary credentials accepted");
        Ok(())
    }

    async fn post_upload(&self, image: &ImageSource, form: Form) -> Result<Url, UploadError> {
        let file = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.content_type)?;
        let form = form.part("file", file);

        let response = self
            .client
            .post(self.endpoint("image/upload")?)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rejected(status.as_u16(), &body));
        }

        let body: UploadResponse = response.json().await?;
        let secure_url = body.secure_url.ok_or(UploadError::MissingUrl)?;
        Ok(Url::parse(&secure_url)?)
    }
}

#[async_trait]
impl MediaHost for CloudinaryClient {
    #[instrument(skip(self, image), fields(size = image.bytes.len()))]
    async fn upload_unsigned(
        &self,
        image: &ImageSource,
        owner: UserId,
    ) -> Result<Url, UploadError> {
        let form = Form::new()
            .text("upload_preset", self.config.upload_preset.clone())
            .text("folder", self.config.folder.clone())
            .text("public_id", object_key(owner));

        self.post_upload(image, form).await
    }

    #[instrument(skip(self, image), fields(size = image.bytes.len()))]
    async fn upload_signed(&self, image: &ImageSource, owner: UserId) -> Result<Url, UploadError> {
        let params = [
            ("folder", self.config.folder.clone()),
            ("overwrite", "true".to_owned()),
            ("public_id", object_key(owner)),
            ("timestamp", Utc::now().timestamp().to_string()),
            ("transformation", self.config.transformation.clone()),
        ];
        let signature = sign(&params, self.config.api_secret.expose_secret());

        let form = params
            .into_iter()
            .fold(Form::new(), |form, (key, value)| form.text(key, value))
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature);

        self.post_upload(image, form).await
    }
}

/// Signature over `params`: sorted `key=value` pairs joined with `&`, the
/// secret appended, SHA-1, lowercase hex. Empty values are left out.
fn sign(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    hex::encode(Sha1::digest(format!("{to_sign}{api_secret}").as_bytes()))
}

/// Build a `Rejected` error, preferring the host's JSON error message.
fn rejected(status: u16, body: &str) -> UploadError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map_or_else(|_| body.trim().to_owned(), |e| e.error.message);
    UploadError::Rejected { status, message }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn config() -> CloudinaryConfig {
        CloudinaryConfig {
            cloud_name: "demo".to_owned(),
            api_key: "1234".to_owned(),
            api_secret: SecretString::from("QJ4w3GN3e2c4ZcvCTuIeTqeHc-Q"),
            upload_preset: CloudinaryConfig::DEFAULT_UPLOAD_PRESET.to_owned(),
            folder: CloudinaryConfig::DEFAULT_FOLDER.to_owned(),
            transformation: CloudinaryConfig::DEFAULT_TRANSFORMATION.to_owned(),
            api_base: Url::parse(CloudinaryConfig::DEFAULT_API_BASE).unwrap(),
        }
    }

    #[test]
    fn test_sign_matches_documented_example() {
        let params = [
            ("timestamp", "1315060510".to_owned()),
            ("public_id", "sample_image".to_owned()),
            ("eager", "w_400,h_300,c_pad|w_260,h_200,c_crop".to_owned()),
        ];
        assert_eq!(
            sign(&params, "abcd"),
            "bfd09f95f331f558cbd1320e67aa8d488770583e"
        );
    }

    #[test]
    fn test_sign_skips_empty_values() {
        let with_empty = [
            ("public_id", "x".to_owned()),
            ("folder", String::new()),
            ("timestamp", "1".to_owned()),
        ];
        let without = [("public_id", "x".to_owned()), ("timestamp", "1".to_owned())];
        assert_eq!(sign(&with_empty, "s"), sign(&without, "s"));
    }

    #[test]
    fn test_upload_endpoint() {
        let client = CloudinaryClient::new(config()).unwrap();
        assert_eq!(
            client.endpoint("image/upload").unwrap().as_str(),
            "https://api.cloudinary.com/v1_1/demo/image/upload"
        );
    }

    #[test]
    fn test_rejected_prefers_json_message() {
        let err = rejected(400, r#"{"error":{"message":"Upload preset not found"}}"#);
        assert!(matches!(
            err,
            UploadError::Rejected { status: 400, ref message }
                if message == "Upload preset not found"
        ));

        let err = rejected(502, "Bad Gateway\n");
        assert!(matches!(
            err,
            UploadError::Rejected { ref message, .. } if message == "Bad Gateway"
        ));
    }
}
