//! Profile repository over `bfn.users`.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use blood_for_nepal_core::{BloodType, UserId, UserProfile};

use super::missing_or_stale;
use crate::store::{ProfileStore, StoreError, collection};

macro_rules! profile_columns {
    () => {
        "id, first_name, last_name, email, phone_number, blood_type, date_of_birth, \
         address, city, district, province, is_verified, is_active, profile_picture, \
         last_donation_date, total_donations, emergency_contact, medical_conditions, \
         preferred_language, created_at, updated_at"
    };
}

/// Repository for profile database operations.
#[derive(Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    /// Create a new profile repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for ProfileRepository {
    #[instrument(skip(self, profile), fields(user_id = %profile.id))]
    async fn save(&self, profile: &UserProfile) -> Result<UserProfile, StoreError> {
        let saved = sqlx::query_as::<_, UserProfile>(concat!(
            "INSERT INTO bfn.users (",
            profile_columns!(),
            ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, \
             $16, $17, $18, $19, $20, GREATEST(now(), $20)) \
             ON CONFLICT (id) DO UPDATE SET \
                first_name = EXCLUDED.first_name, \
                last_name = EXCLUDED.last_name, \
                email = EXCLUDED.email, \
                phone_number = EXCLUDED.phone_number, \
                blood_type = EXCLUDED.blood_type, \
                date_of_birth = EXCLUDED.date_of_birth, \
                address = EXCLUDED.address, \
                city = EXCLUDED.city, \
                district = EXCLUDED.district, \
                province = EXCLUDED.province, \
                is_verified = EXCLUDED.is_verified, \
                is_active = EXCLUDED.is_active, \
                profile_picture = EXCLUDED.profile_picture, \
                last_donation_date = EXCLUDED.last_donation_date, \
                total_donations = EXCLUDED.total_donations, \
                emergency_contact = EXCLUDED.emergency_contact, \
                medical_conditions = EXCLUDED.medical_conditions, \
                preferred_language = EXCLUDED.preferred_language, \
                updated_at = GREATEST(now(), users.updated_at + interval '1 microsecond') \
             RETURNING ",
            profile_columns!()
        ))
        .bind(profile.id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.email)
        .bind(&profile.phone_number)
        .bind(profile.blood_type)
        .bind(&profile.date_of_birth)
        .bind(&profile.address)
        .bind(&profile.city)
        .bind(&profile.district)
        .bind(&profile.province)
        .bind(profile.is_verified)
        .bind(profile.is_active)
        .bind(&profile.profile_picture)
        .bind(&profile.last_donation_date)
        .bind(profile.total_donations)
        .bind(&profile.emergency_contact)
        .bind(&profile.medical_conditions)
        .bind(&profile.preferred_language)
        .bind(profile.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(saved)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: UserId) -> Result<UserProfile, StoreError> {
        // Column defaults give the blank profile.
        sqlx::query("INSERT INTO bfn.users (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let profile = sqlx::query_as::<_, UserProfile>(concat!(
            "SELECT ",
            profile_columns!(),
            " FROM bfn.users WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(profile)
    }

    #[instrument(skip(self, profile), fields(user_id = %profile.id))]
    async fn update(&self, profile: &UserProfile) -> Result<UserProfile, StoreError> {
        let updated = sqlx::query_as::<_, UserProfile>(concat!(
            "UPDATE bfn.users SET \
                first_name = $2, \
                last_name = $3, \
                email = $4, \
                phone_number = $5, \
                blood_type = $6, \
                date_of_birth = $7, \
                address = $8, \
                city = $9, \
                district = $10, \
                province = $11, \
                is_verified = $12, \
                is_active = $13, \
                profile_picture = $14, \
                last_donation_date = $15, \
                total_donations = $16, \
                emergency_contact = $17, \
                medical_conditions = $18, \
                preferred_language = $19, \
                updated_at = GREATEST(now(), updated_at + interval '1 microsecond') \
             WHERE id = $1 AND updated_at = $20 \
             RETURNING ",
            profile_columns!()
        ))
        .bind(profile.id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.email)
        .bind(&profile.phone_number)
        .bind(profile.blood_type)
        .bind(&profile.date_of_birth)
        .bind(&profile.address)
        .bind(&profile.city)
        .bind(&profile.district)
        .bind(&profile.province)
        .bind(profile.is_verified)
        .bind(profile.is_active)
        .bind(&profile.profile_picture)
        .bind(&profile.last_donation_date)
        .bind(profile.total_donations)
        .bind(&profile.emergency_contact)
        .bind(&profile.medical_conditions)
        .bind(&profile.preferred_language)
        .bind(profile.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(profile) => Ok(profile),
            None => Err(missing_or_stale(
                &self.pool,
                "SELECT EXISTS (SELECT 1 FROM bfn.users WHERE id = $1)",
                profile.id.as_uuid(),
                collection::PROFILE,
            )
            .await),
        }
    }

    #[instrument(skip(self))]
    async fn search_donor_ids(
        &self,
        blood_type: BloodType,
        city: Option<&str>,
    ) -> Result<Vec<UserId>, StoreError> {
        let ids = sqlx::query_scalar::<_, UserId>(
            r"
            SELECT id
            FROM bfn.users
            WHERE is_active
              AND blood_type = $1
              AND ($2::TEXT IS NULL OR city = $2)
            ORDER BY created_at DESC
            ",
        )
        .bind(blood_type)
        .bind(city)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
