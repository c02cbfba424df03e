//! Blood request repository over `bfn.blood_requests`.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use blood_for_nepal_core::{BloodRequest, BloodRequestId, NewBloodRequest, RequestStatus};

use super::{limit_param, missing_or_stale};
use crate::store::{RequestQuery, RequestStore, StoreError, collection};

macro_rules! request_columns {
    () => {
        "id, patient_name, gender, case_description, blood_type, units_needed, urgency, \
         hospital, contact_person, contact_phone, required_by, description, requested_by, \
         status, location, city, district, province, created_at, updated_at"
    };
}

/// Repository for blood request database operations.
#[derive(Clone)]
pub struct RequestRepository {
    pool: PgPool,
}

impl RequestRepository {
    /// Create a new blood request repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestStore for RequestRepository {
    #[instrument(skip(self, request), fields(requested_by = %request.requested_by))]
    async fn create(&self, request: NewBloodRequest) -> Result<BloodRequest, StoreError> {
        let created = sqlx::query_as::<_, BloodRequest>(concat!(
            "INSERT INTO bfn.blood_requests \
                (patient_name, gender, case_description, blood_type, units_needed, urgency, \
                 hospital, contact_person, contact_phone, required_by, description, \
                 requested_by, location, city, district, province) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING ",
            request_columns!()
        ))
        .bind(&request.patient_name)
        .bind(&request.gender)
        .bind(&request.case_description)
        .bind(request.blood_type)
        .bind(request.units_needed)
        .bind(request.urgency)
        .bind(&request.hospital)
        .bind(&request.contact_person)
        .bind(&request.contact_phone)
        .bind(&request.required_by)
        .bind(&request.description)
        .bind(request.requested_by)
        .bind(&request.location)
        .bind(&request.city)
        .bind(&request.district)
        .bind(&request.province)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(request_id = %created.id, "Blood request created");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: BloodRequestId) -> Result<BloodRequest, StoreError> {
        sqlx::query_as::<_, BloodRequest>(concat!(
            "SELECT ",
            request_columns!(),
            " FROM bfn.blood_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(collection::BLOOD_REQUEST, id))
    }

    #[instrument(skip(self, request), fields(request_id = %request.id))]
    async fn update(&self, request: &BloodRequest) -> Result<BloodRequest, StoreError> {
        let updated = sqlx::query_as::<_, BloodRequest>(concat!(
            "UPDATE bfn.blood_requests SET \
                patient_name = $2, \
                gender = $3, \
                case_description = $4, \
                blood_type = $5, \
                units_needed = $6, \
                urgency = $7, \
                hospital = $8, \
                contact_person = $9, \
                contact_phone = $10, \
                required_by = $11, \
                description = $12, \
                status = $13, \
                location = $14, \
                city = $15, \
                district = $16, \
                province = $17, \
                updated_at = GREATEST(now(), updated_at + interval '1 microsecond') \
             WHERE id = $1 AND updated_at = $18 \
             RETURNING ",
            request_columns!()
        ))
        .bind(request.id)
        .bind(&request.patient_name)
        .bind(&request.gender)
        .bind(&request.case_description)
        .bind(request.blood_type)
        .bind(request.units_needed)
        .bind(request.urgency)
        .bind(&request.hospital)
        .bind(&request.contact_person)
        .bind(&request.contact_phone)
        .bind(&request.required_by)
        .bind(&request.description)
        .bind(request.status)
        .bind(&request.location)
        .bind(&request.city)
        .bind(&request.district)
        .bind(&request.province)
        .bind(request.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(request) => Ok(request),
            None => Err(missing_or_stale(
                &self.pool,
                "SELECT EXISTS (SELECT 1 FROM bfn.blood_requests WHERE id = $1)",
                request.id.as_uuid(),
                collection::BLOOD_REQUEST,
            )
            .await),
        }
    }

    #[instrument(skip(self))]
    async fn set_status(
        &self,
        id: BloodRequestId,
        status: RequestStatus,
    ) -> Result<BloodRequest, StoreError> {
        sqlx::query_as::<_, BloodRequest>(concat!(
            "UPDATE bfn.blood_requests SET \
                status = $2, \
                updated_at = GREATEST(now(), updated_at + interval '1 microsecond') \
             WHERE id = $1 \
             RETURNING ",
            request_columns!()
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(collection::BLOOD_REQUEST, id))
    }

    #[instrument(skip(self))]
    async fn list(&self, query: &RequestQuery) -> Result<Vec<BloodRequest>, StoreError> {
        let requests = sqlx::query_as::<_, BloodRequest>(concat!(
            "SELECT ",
            request_columns!(),
            " FROM bfn.blood_requests \
             WHERE status = $1 \
               AND ($2::TEXT IS NULL OR blood_type = $2) \
               AND ($3::TEXT IS NULL OR city = $3) \
               AND ($4::UUID IS NULL OR requested_by = $4) \
             ORDER BY created_at DESC \
             LIMIT $5"
        ))
        .bind(query.status)
        .bind(query.blood_type)
        .bind(query.city.as_deref())
        .bind(query.requested_by)
        .bind(limit_param(query.limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }
}
