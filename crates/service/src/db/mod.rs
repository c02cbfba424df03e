//! `PostgreSQL` store backend.
//!
//! # Schema: `bfn`
//!
//! ## Tables
//!
//! - `users` - Profiles, keyed by the account's user id
//! - `accounts` - Email + argon2 password hash per user
//! - `password_reset_tokens` - SHA-256 hashes of outstanding reset tokens
//! - `blood_requests` - Posted requests for blood
//! - `donors` - Donor registrations (one per user)
//! - `donations` - Donation history
//!
//! Document references are plain UUID columns without foreign keys; deleting
//! a document never cascades.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/service/migrations/` and run via:
//! ```bash
//! cargo run -p blood-for-nepal-cli -- migrate
//! ```

pub mod accounts;
pub mod donations;
pub mod donors;
pub mod profiles;
pub mod requests;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub use accounts::AccountRepository;
pub use donations::DonationRepository;
pub use donors::DonorRepository;
pub use profiles::ProfileRepository;
pub use requests::RequestRepository;

use crate::store::StoreError;

/// Embedded migrations from `crates/service/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Apply pending migrations.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails or the applied history
/// diverges from the embedded migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// Map a unique violation to `Conflict(message)`, anything else to `Database`.
fn conflict_on_unique(err: sqlx::Error, message: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return StoreError::Conflict(message.to_owned());
    }
    StoreError::Database(err)
}

/// Resolve a full-document update that matched no row: the document is
/// either gone or was changed since the caller read it.
async fn missing_or_stale(
    pool: &PgPool,
    exists_sql: &'static str,
    id: uuid::Uuid,
    collection: &'static str,
) -> StoreError {
    match sqlx::query_scalar::<_, bool>(exists_sql)
        .bind(id)
        .fetch_one(pool)
        .await
    {
        Ok(true) => StoreError::stale(collection),
        Ok(false) => StoreError::not_found(collection, id),
        Err(e) => StoreError::Database(e),
    }
}

/// Postgres `LIMIT` takes a bigint.
fn limit_param(limit: u32) -> i64 {
    i64::from(limit)
}
