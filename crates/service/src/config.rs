//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BFN_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `BFN_BASE_URL` - Public URL used in password-reset links (default: `http://localhost:8080`)
//! - `CLOUDINARY_CLOUD_NAME`, `CLOUDINARY_API_KEY`, `CLOUDINARY_API_SECRET` -
//!   media host credentials; all three or none
//! - `CLOUDINARY_UPLOAD_PRESET` - Unsigned preset (default: `blood_for_nepal_preset`)
//! - `CLOUDINARY_FOLDER` - Target folder (default: `blood_for_nepal/profiles`)
//! - `CLOUDINARY_TRANSFORMATION` - Transformation applied to signed uploads
//!   (default: `c_fill,w_400,h_400,q_auto,f_auto`)
//! - `CLOUDINARY_API_BASE` - API origin (default: `https://api.cloudinary.com`)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM` -
//!   outgoing mail; when `SMTP_HOST` is unset reset links are only logged
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)

use std::collections::HashMap;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// Public base URL, used to build password-reset links
    pub base_url: Url,
    /// Media host configuration (absent when uploads are disabled)
    pub cloudinary: Option<CloudinaryConfig>,
    /// Outgoing email configuration (absent when reset links are only logged)
    pub email: Option<EmailConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
}

/// Cloudinary media host configuration.
///
/// Implements `Debug` manually to redact the API secret.
#[derive(Clone)]
pub struct CloudinaryConfig {
    /// Cloud name from the Cloudinary dashboard
    pub cloud_name: String,
    /// API key used for signed uploads
    pub api_key: String,
    /// API secret used to sign uploads (server-held)
    pub api_secret: SecretString,
    /// Unsigned upload preset name
    pub upload_preset: String,
    /// Folder every profile picture is stored under
    pub folder: String,
    /// Transformation applied to signed uploads
    pub transformation: String,
    /// API origin, overridable for tests
    pub api_base: Url,
}

impl std::fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("upload_preset", &self.upload_preset)
            .field("folder", &self.folder)
            .field("transformation", &self.transformation)
            .field("api_base", &self.api_base.as_str())
            .finish()
    }
}

impl CloudinaryConfig {
    /// Default unsigned preset name.
    pub const DEFAULT_UPLOAD_PRESET: &'static str = "blood_for_nepal_preset";
    /// Default folder for profile pictures.
    pub const DEFAULT_FOLDER: &'static str = "blood_for_nepal/profiles";
    /// Default profile picture transformation: 400x400 fill, automatic quality and format.
    pub const DEFAULT_TRANSFORMATION: &'static str = "c_fill,w_400,h_400,q_auto,f_auto";
    /// Default API origin.
    pub const DEFAULT_API_BASE: &'static str = "https://api.cloudinary.com";

    /// Load from environment. Returns `Ok(None)` when no credentials are set.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(cloud_name) = get_optional_env("CLOUDINARY_CLOUD_NAME") else {
            return Ok(None);
        };

        Ok(Some(Self {
            cloud_name,
            api_key: get_required_env("CLOUDINARY_API_KEY")?,
            api_secret: get_validated_secret("CLOUDINARY_API_SECRET")?,
            upload_preset: get_env_or_default(
                "CLOUDINARY_UPLOAD_PRESET",
                Self::DEFAULT_UPLOAD_PRESET,
            ),
            folder: get_env_or_default("CLOUDINARY_FOLDER", Self::DEFAULT_FOLDER),
            transformation: get_env_or_default(
                "CLOUDINARY_TRANSFORMATION",
                Self::DEFAULT_TRANSFORMATION,
            ),
            api_base: parse_url(
                "CLOUDINARY_API_BASE",
                &get_env_or_default("CLOUDINARY_API_BASE", Self::DEFAULT_API_BASE),
            )?,
        }))
    }
}

/// SMTP configuration for password-reset emails.
///
/// Implements `Debug` manually to redact the SMTP password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// SMTP authentication username
    pub smtp_username: String,
    /// SMTP authentication password
    pub smtp_password: SecretString,
    /// Email sender address (From header)
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl EmailConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };

        let smtp_port = get_env_or_default("SMTP_PORT", "587")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string()))?;

        Ok(Some(Self {
            smtp_host,
            smtp_port,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: SecretString::from(get_required_env("SMTP_PASSWORD")?),
            from_address: get_env_or_default(
                "EMAIL_FROM",
                "Blood for Nepal <no-reply@bloodfornepal.org>",
            ),
        }))
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("BFN_DATABASE_URL")?;
        let base_url = parse_url(
            "BFN_BASE_URL",
            &get_env_or_default("BFN_BASE_URL", "http://localhost:8080"),
        )?;
        let cloudinary = CloudinaryConfig::from_env()?;
        let email = EmailConfig::from_env()?;

        let sentry_sample_rate = get_env_or_default("SENTRY_SAMPLE_RATE", "1.0")
            .parse::<f32>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SENTRY_SAMPLE_RATE".to_string(), e.to_string())
            })?;

        Ok(Self {
            database_url,
            base_url,
            cloudinary,
            email,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Blank values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= \
                 {MIN_ENTROPY_BITS_PER_CHAR:.1}). Copy the secret from the Cloudinary dashboard."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
