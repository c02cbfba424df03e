//! Subcommand implementations.
//!
//! Commands that act as a user sign in first with `--email`/`--password`
//! (or `BFN_EMAIL`/`BFN_PASSWORD`); sessions do not outlive the process.

pub mod account;
pub mod donation;
pub mod donor;
pub mod migrate;
pub mod profile;
pub mod request;

use blood_for_nepal_service::config::ConfigError;
use blood_for_nepal_service::controller::{ControllerError, SessionController};
use blood_for_nepal_service::media::UploadError;
use blood_for_nepal_service::{AppState, ServiceConfig, ServiceError};
use clap::Args;
use serde::Serialize;
use thiserror::Error;

use blood_for_nepal_core::UserProfile;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Service(#[from] ServiceError),

    /// Operation failed; carries the text a user would see.
    #[error("{0}")]
    Rejected(String),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Media host error: {0}")]
    Upload(#[from] UploadError),

    #[error("Could not write output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl From<ControllerError> for CliError {
    fn from(err: ControllerError) -> Self {
        match err {
            ControllerError::Service(e) => Self::Rejected(e.user_message()),
            ControllerError::Busy => Self::Rejected("another operation is in progress".to_owned()),
        }
    }
}

/// Credentials of the user a command acts as.
#[derive(Debug, Args)]
pub struct Credentials {
    /// Account email
    #[arg(long = "as", env = "BFN_EMAIL", value_name = "EMAIL")]
    pub email: String,

    /// Account password
    #[arg(long, env = "BFN_PASSWORD", hide_env_values = true)]
    pub password: String,
}

/// Connect and sign in as `credentials`.
pub async fn sign_in(
    config: &ServiceConfig,
    credentials: &Credentials,
) -> Result<(AppState, SessionController, UserProfile), CliError> {
    let state = AppState::connect(config).await?;
    let session = state.session();
    let profile = session
        .sign_in(&credentials.email, &credentials.password)
        .await?;
    Ok((state, session, profile))
}

/// Print `value` to stdout as pretty JSON.
pub fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{json}");
    }
    Ok(())
}

/// Check Cloudinary credentials.
pub async fn cloudinary_ping(config: &ServiceConfig) -> Result<(), CliError> {
    let cloudinary = config
        .cloudinary
        .clone()
        .ok_or(CliError::NotConfigured("Cloudinary"))?;

    let client = blood_for_nepal_service::media::CloudinaryClient::new(cloudinary)?;
    client.ping().await?;
    tracing::info!("Cloudinary is reachable");
    Ok(())
}
