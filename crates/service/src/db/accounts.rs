//! Account and password-reset repository.
//!
//! Accounts hold login credentials only; everything a user can edit lives in
//! their profile in `bfn.users`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use blood_for_nepal_core::{Email, UserId};

use super::conflict_on_unique;
use crate::store::{Account, AccountStore, StoreError, collection};

#[derive(sqlx::FromRow)]
struct AccountRow {
    user_id: UserId,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            StoreError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            user_id: row.user_id,
            email,
            password_hash: row.password_hash,
            created_at: row.created_at,
        })
    }
}

/// Repository for account database operations.
#[derive(Clone)]
pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    /// Create a new account repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for AccountRepository {
    #[instrument(skip(self, password_hash))]
    async fn create_account(
        &self,
        email: &Email,
        password_hash: &str,
    ) -> Result<Account, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r"
            INSERT INTO bfn.accounts (email, password_hash)
            VALUES ($1, $2)
            RETURNING user_id, email, password_hash, created_at
            ",
        )
        .bind(email.as_str())
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "email already exists"))?;

        row.try_into()
    }

    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &Email) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r"
            SELECT user_id, email, password_hash, created_at
            FROM bfn.accounts
            WHERE email = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Account::try_from).transpose()
    }

    #[instrument(skip(self, password_hash))]
    async fn set_password_hash(
        &self,
        user_id: UserId,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"
            UPDATE bfn.accounts
            SET password_hash = $2, updated_at = now()
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(collection::ACCOUNT, user_id));
        }
        Ok(())
    }

    #[instrument(skip(self, token_hash))]
    async fn insert_reset_token(
        &self,
        user_id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO bfn.password_reset_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self, token_hash))]
    async fn consume_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, StoreError> {
        let user_id = sqlx::query_scalar::<_, UserId>(
            r"
            UPDATE bfn.password_reset_tokens
            SET used_at = $2
            WHERE token_hash = $1 AND used_at IS NULL AND expires_at > $2
            RETURNING user_id
            ",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user_id)
    }
}
