//! Donor repository over `bfn.donors`.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use blood_for_nepal_core::{Donor, DonorId, NewDonor, UserId};

use super::{conflict_on_unique, limit_param, missing_or_stale};
use crate::store::{ActiveChange, DonorQuery, DonorStore, StoreError, collection};

macro_rules! donor_columns {
    () => {
        "id, user_id, name, blood_type, city, phone_number, last_donation_date, active, \
         created_at, updated_at"
    };
}

/// Repository for donor database operations.
#[derive(Clone)]
pub struct DonorRepository {
    pool: PgPool,
}

impl DonorRepository {
    /// Create a new donor repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DonorStore for DonorRepository {
    #[instrument(skip(self, donor), fields(user_id = %donor.user_id))]
    async fn create(&self, donor: NewDonor) -> Result<Donor, StoreError> {
        let created = sqlx::query_as::<_, Donor>(concat!(
            "INSERT INTO bfn.donors \
                (user_id, name, blood_type, city, phone_number, last_donation_date) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING ",
            donor_columns!()
        ))
        .bind(donor.user_id)
        .bind(&donor.name)
        .bind(donor.blood_type)
        .bind(&donor.city)
        .bind(&donor.phone_number)
        .bind(&donor.last_donation_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "You are already registered as a donor"))?;

        tracing::info!(donor_id = %created.id, "Donor registered");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: DonorId) -> Result<Donor, StoreError> {
        sqlx::query_as::<_, Donor>(concat!(
            "SELECT ",
            donor_columns!(),
            " FROM bfn.donors WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(collection::DONOR, id))
    }

    #[instrument(skip(self))]
    async fn find_by_user(&self, user_id: UserId) -> Result<Option<Donor>, StoreError> {
        let donor = sqlx::query_as::<_, Donor>(concat!(
            "SELECT ",
            donor_columns!(),
            " FROM bfn.donors WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(donor)
    }

    #[instrument(skip(self, donor), fields(donor_id = %donor.id))]
    async fn update(&self, donor: &Donor) -> Result<Donor, StoreError> {
        let updated = sqlx::query_as::<_, Donor>(concat!(
            "UPDATE bfn.donors SET \
                name = $2, \
                blood_type = $3, \
                city = $4, \
                phone_number = $5, \
                last_donation_date = $6, \
                active = $7, \
                updated_at = GREATEST(now(), updated_at + interval '1 microsecond') \
             WHERE id = $1 AND updated_at = $8 \
             RETURNING ",
            donor_columns!()
        ))
        .bind(donor.id)
        .bind(&donor.name)
        .bind(donor.blood_type)
        .bind(&donor.city)
        .bind(&donor.phone_number)
        .bind(&donor.last_donation_date)
        .bind(donor.active)
        .bind(donor.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(donor) => Ok(donor),
            None => Err(missing_or_stale(
                &self.pool,
                "SELECT EXISTS (SELECT 1 FROM bfn.donors WHERE id = $1)",
                donor.id.as_uuid(),
                collection::DONOR,
            )
            .await),
        }
    }

    #[instrument(skip(self))]
    async fn set_active(&self, id: DonorId, active: bool) -> Result<ActiveChange, StoreError> {
        let changed = sqlx::query_as::<_, Donor>(concat!(
            "UPDATE bfn.donors SET \
                active = $2, \
                updated_at = GREATEST(now(), updated_at + interval '1 microsecond') \
             WHERE id = $1 AND active <> $2 \
             RETURNING ",
            donor_columns!()
        ))
        .bind(id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(donor) = changed {
            tracing::info!(donor_id = %id, active, "Donor availability changed");
            return Ok(ActiveChange {
                donor,
                changed: true,
            });
        }

        // Either already at the requested value or missing.
        let donor = self.get(id).await?;
        Ok(ActiveChange {
            donor,
            changed: false,
        })
    }

    #[instrument(skip(self))]
    async fn list(&self, query: &DonorQuery) -> Result<Vec<Donor>, StoreError> {
        let donors = sqlx::query_as::<_, Donor>(concat!(
            "SELECT ",
            donor_columns!(),
            " FROM bfn.donors \
             WHERE ($1::TEXT IS NULL OR blood_type = $1) \
               AND ($2::TEXT IS NULL OR city = $2) \
               AND ($3::BOOLEAN IS NULL OR active = $3) \
             ORDER BY created_at DESC \
             LIMIT $4"
        ))
        .bind(query.blood_type)
        .bind(query.city.as_deref())
        .bind(query.active)
        .bind(limit_param(query.limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(donors)
    }
}
