//! Donation repository over `bfn.donations`.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use blood_for_nepal_core::{DonationRecord, DonorStats, NewDonationRecord, UserId};

use crate::store::{DonationStore, StoreError};

/// Repository for donation database operations.
#[derive(Clone)]
pub struct DonationRepository {
    pool: PgPool,
}

impl DonationRepository {
    /// Create a new donation repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DonationStore for DonationRepository {
    #[instrument(skip(self, record), fields(donor_id = %record.donor_id))]
    async fn create(&self, record: NewDonationRecord) -> Result<DonationRecord, StoreError> {
        let created = sqlx::query_as::<_, DonationRecord>(
            r"
            INSERT INTO bfn.donations
                (donor_id, recipient_id, blood_type, units, donation_date, hospital, notes, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, donor_id, recipient_id, blood_type, units, donation_date,
                      hospital, notes, status, created_at
            ",
        )
        .bind(record.donor_id)
        .bind(record.recipient_id)
        .bind(record.blood_type)
        .bind(record.units)
        .bind(&record.donation_date)
        .bind(&record.hospital)
        .bind(&record.notes)
        .bind(record.status)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    #[instrument(skip(self))]
    async fn history(&self, donor_id: UserId) -> Result<Vec<DonationRecord>, StoreError> {
        let records = sqlx::query_as::<_, DonationRecord>(
            r"
            SELECT id, donor_id, recipient_id, blood_type, units, donation_date,
                   hospital, notes, status, created_at
            FROM bfn.donations
            WHERE donor_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(donor_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    #[instrument(skip(self))]
    async fn stats(&self, donor_id: UserId) -> Result<DonorStats, StoreError> {
        let (total_donations, total_units) = sqlx::query_as::<_, (i64, i64)>(
            r"
            SELECT COUNT(*), COALESCE(SUM(units), 0)::BIGINT
            FROM bfn.donations
            WHERE donor_id = $1 AND status = 'COMPLETED'
            ",
        )
        .bind(donor_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(DonorStats {
            total_donations,
            total_units,
        })
    }
}
