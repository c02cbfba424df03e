//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! bfn migrate
//! ```
//!
//! # Environment Variables
//!
//! - `BFN_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Migrations live in `crates/service/migrations/` and are embedded in the
//! binary at build time.

use blood_for_nepal_service::store::StoreError;
use blood_for_nepal_service::{ServiceConfig, ServiceError, db};

use super::CliError;

/// Apply pending migrations.
pub async fn run(config: &ServiceConfig) -> Result<(), CliError> {
    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url)
        .await
        .map_err(|e| ServiceError::from(StoreError::from(e)))?;

    tracing::info!("Running migrations...");
    db::run_migrations(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
