//! Blood for Nepal CLI - Database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! bfn migrate
//!
//! # Create an account and sign in as it
//! bfn account sign-up -e ram@example.com -f Ram -l Thapa -p 9800000000
//!
//! # Post a blood request (credentials from BFN_EMAIL / BFN_PASSWORD)
//! bfn request create --patient "Hari" --blood-type O+ --units 2 \
//!     --urgency high --hospital "Bir Hospital" --phone 9800000000
//!
//! # List available donors in a city
//! bfn donor list --blood-type O+ --city Kathmandu --active
//! ```
//!
//! # Commands
//!
//! - `migrate` - Apply database migrations
//! - `account` - Sign up, password reset
//! - `profile` - Show and edit the signed-in profile, upload a photo
//! - `request` - Post, list and close blood requests
//! - `donor` - Register as donor, list donors, toggle availability
//! - `donation` - Record donations, show history and totals
//! - `cloudinary ping` - Check media host credentials
//!
//! Results are printed to stdout as JSON.

#![cfg_attr(not(test), forbid(unsafe_code))]

use blood_for_nepal_service::ServiceConfig;
use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{
    CliError, account::AccountAction, donation::DonationAction, donor::DonorAction,
    profile::ProfileAction, request::RequestAction,
};

#[derive(Parser)]
#[command(name = "bfn")]
#[command(author, version, about = "Blood for Nepal CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,
    /// Accounts and password reset
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// The signed-in user's profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Blood requests
    Request {
        #[command(subcommand)]
        action: RequestAction,
    },
    /// Donor registrations
    Donor {
        #[command(subcommand)]
        action: DonorAction,
    },
    /// Donation history
    Donation {
        #[command(subcommand)]
        action: DonationAction,
    },
    /// Media host
    Cloudinary {
        #[command(subcommand)]
        action: CloudinaryAction,
    },
}

#[derive(Subcommand)]
enum CloudinaryAction {
    /// Check that the configured credentials are accepted
    Ping,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ServiceConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load .env before parsing so `env = ...` arguments see it
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Sentry must be initialized before the tracing subscriber
    let config = ServiceConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "blood_for_nepal=info,bfn=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match config {
        Ok(config) => run(cli, &config).await,
        Err(e) => Err(CliError::Config(e)),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &ServiceConfig) -> Result<(), CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run(config).await?,
        Commands::Account { action } => commands::account::run(config, action).await?,
        Commands::Profile { action } => commands::profile::run(config, action).await?,
        Commands::Request { action } => commands::request::run(config, action).await?,
        Commands::Donor { action } => commands::donor::run(config, action).await?,
        Commands::Donation { action } => commands::donation::run(config, action).await?,
        Commands::Cloudinary {
            action: CloudinaryAction::Ping,
        } => commands::cloudinary_ping(config).await?,
    }
    Ok(())
}
