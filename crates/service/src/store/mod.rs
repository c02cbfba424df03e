//! Store contracts over the four document collections plus accounts.
//!
//! Every store operation is async, returns `Result<T, StoreError>` and is
//! never retried. Ids are assigned by the store at creation and never change;
//! updates never rewrite `id`, `created_at` or the owning user reference.
//!
//! Two backends implement these traits:
//! - [`crate::db`] - `PostgreSQL` via sqlx
//! - [`memory::MemoryBackend`] - in-process maps, for tests and local runs
//!
//! # Concurrency
//!
//! Full-document updates (`ProfileStore::update`, `RequestStore::update`,
//! `DonorStore::update`) are optimistic: the document's `updated_at` must
//! match the stored value or the update fails with [`StoreError::Conflict`].
//! Narrow field updates (`set_status`, `set_active`) are last-write-wins.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use blood_for_nepal_core::{
    BloodRequest, BloodRequestId, BloodType, DonationRecord, Donor, DonorId, DonorStats, Email,
    NewBloodRequest, NewDonationRecord, NewDonor, RequestStatus, UserId, UserProfile,
};

/// Human names of the collections, used in error messages.
pub mod collection {
    pub const PROFILE: &str = "profile";
    pub const BLOOD_REQUEST: &str = "blood request";
    pub const DONOR: &str = "donor";
    pub const DONATION: &str = "donation";
    pub const ACCOUNT: &str = "account";
}

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Requested document was not found.
    #[error("{collection} {id} not found")]
    NotFound {
        collection: &'static str,
        id: String,
    },

    /// Constraint violation or stale update.
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

impl StoreError {
    /// Not-found error for a document id.
    pub fn not_found(collection: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            collection,
            id: id.to_string(),
        }
    }

    /// Conflict raised when the caller's copy of a document is out of date.
    #[must_use]
    pub fn stale(collection: &'static str) -> Self {
        Self::Conflict(format!(
            "This {collection} was changed by someone else. Reload and try again."
        ))
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Filters for [`RequestStore::list`]. Unset filters match everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestQuery {
    pub blood_type: Option<BloodType>,
    pub city: Option<String>,
    pub requested_by: Option<UserId>,
    pub status: RequestStatus,
    pub limit: u32,
}

impl RequestQuery {
    /// Default page size.
    pub const DEFAULT_LIMIT: u32 = 20;

    /// Active requests posted by one user.
    #[must_use]
    pub fn by_user(user: UserId) -> Self {
        Self {
            requested_by: Some(user),
            ..Self::default()
        }
    }

    /// Whether `request` satisfies every set filter. Ignores the limit.
    #[must_use]
    pub fn matches(&self, request: &BloodRequest) -> bool {
        request.status == self.status
            && self.blood_type.is_none_or(|bt| request.blood_type == bt)
            && self.city.as_deref().is_none_or(|city| request.city == city)
            && self.requested_by.is_none_or(|user| request.requested_by == user)
    }
}

impl Default for RequestQuery {
    fn default() -> Self {
        Self {
            blood_type: None,
            city: None,
            requested_by: None,
            status: RequestStatus::Active,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// Filters for [`DonorStore::list`]. Unset filters match everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonorQuery {
    pub blood_type: Option<BloodType>,
    pub city: Option<String>,
    pub active: Option<bool>,
    pub limit: u32,
}

impl DonorQuery {
    /// Default page size.
    pub const DEFAULT_LIMIT: u32 = 50;

    /// Whether `donor` satisfies every set filter. Ignores the limit.
    #[must_use]
    pub fn matches(&self, donor: &Donor) -> bool {
        self.blood_type.is_none_or(|bt| donor.blood_type == bt)
            && self.city.as_deref().is_none_or(|city| donor.city == city)
            && self.active.is_none_or(|active| donor.active == active)
    }
}

impl Default for DonorQuery {
    fn default() -> Self {
        Self {
            blood_type: None,
            city: None,
            active: None,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// Result of [`DonorStore::set_active`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveChange {
    /// The stored donor after the call.
    pub donor: Donor,
    /// False when the donor already had the requested value.
    pub changed: bool,
}

// =============================================================================
// Accounts
// =============================================================================

/// Login credentials for a user. The account's `user_id` is the principal id
/// and the key of the user's profile.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub user_id: UserId,
    pub email: Email,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .finish()
    }
}

// =============================================================================
// Contracts
// =============================================================================

/// The `users` collection, keyed by principal id.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Insert or replace the profile with `profile.id`.
    ///
    /// Keeps the stored `created_at` when the profile already exists.
    async fn save(&self, profile: &UserProfile) -> Result<UserProfile, StoreError>;

    /// Fetch a profile. A missing profile is created blank and returned.
    async fn get(&self, id: UserId) -> Result<UserProfile, StoreError>;

    /// Replace a profile's fields. `profile.updated_at` must match the stored value.
    async fn update(&self, profile: &UserProfile) -> Result<UserProfile, StoreError>;

    /// Ids of active profiles with `blood_type`, optionally restricted to a city.
    async fn search_donor_ids(
        &self,
        blood_type: BloodType,
        city: Option<&str>,
    ) -> Result<Vec<UserId>, StoreError>;
}

/// The `blood_requests` collection.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn create(&self, request: NewBloodRequest) -> Result<BloodRequest, StoreError>;

    async fn get(&self, id: BloodRequestId) -> Result<BloodRequest, StoreError>;

    /// Replace a request's fields. `request.updated_at` must match the stored value.
    async fn update(&self, request: &BloodRequest) -> Result<BloodRequest, StoreError>;

    /// Change only the status.
    async fn set_status(
        &self,
        id: BloodRequestId,
        status: RequestStatus,
    ) -> Result<BloodRequest, StoreError>;

    /// Matching requests, newest first, at most `query.limit`.
    async fn list(&self, query: &RequestQuery) -> Result<Vec<BloodRequest>, StoreError>;
}

/// The `donors` collection. A user registers at most once.
#[async_trait]
pub trait DonorStore: Send + Sync {
    /// Register a donor. Fails with `Conflict` if the user is already registered.
    async fn create(&self, donor: NewDonor) -> Result<Donor, StoreError>;

    async fn get(&self, id: DonorId) -> Result<Donor, StoreError>;

    /// The registration belonging to `user_id`, if any.
    async fn find_by_user(&self, user_id: UserId) -> Result<Option<Donor>, StoreError>;

    /// Replace a donor's fields. `donor.updated_at` must match the stored value.
    async fn update(&self, donor: &Donor) -> Result<Donor, StoreError>;

    /// Change only `active`. Setting the current value is a no-op.
    async fn set_active(&self, id: DonorId, active: bool) -> Result<ActiveChange, StoreError>;

    /// Matching donors, newest first, at most `query.limit`.
    async fn list(&self, query: &DonorQuery) -> Result<Vec<Donor>, StoreError>;
}

/// The `donations` collection.
#[async_trait]
pub trait DonationStore: Send + Sync {
    async fn create(&self, record: NewDonationRecord) -> Result<DonationRecord, StoreError>;

    /// Every donation by `donor_id`, newest first.
    async fn history(&self, donor_id: UserId) -> Result<Vec<DonationRecord>, StoreError>;

    /// Count and unit total of `donor_id`'s completed donations.
    async fn stats(&self, donor_id: UserId) -> Result<DonorStats, StoreError>;
}

/// Login accounts and password-reset tokens.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Create an account with a fresh user id. Fails with `Conflict` if the
    /// email is taken.
    async fn create_account(
        &self,
        email: &Email,
        password_hash: &str,
    ) -> Result<Account, StoreError>;

    async fn find_by_email(&self, email: &Email) -> Result<Option<Account>, StoreError>;

    async fn set_password_hash(
        &self,
        user_id: UserId,
        password_hash: &str,
    ) -> Result<(), StoreError>;

    /// Store the hash of a reset token for `user_id`.
    async fn insert_reset_token(
        &self,
        user_id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Mark a token used and return its user, if the token exists, is unused
    /// and expires after `now`. A token is consumed at most once.
    async fn consume_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, StoreError>;
}

/// Sort newest first and keep at most `limit` items.
pub(crate) fn newest_first<T>(
    items: &mut Vec<T>,
    created_at: impl Fn(&T) -> DateTime<Utc>,
    limit: u32,
) {
    items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
    items.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
}

#[cfg(test)]
mod tests {
    use super::*;
    use blood_for_nepal_core::{Urgency, now_micros};

    fn request(city: &str, status: RequestStatus) -> BloodRequest {
        let mut request = NewBloodRequest {
            patient_name: "Sita".to_owned(),
            gender: String::new(),
            case_description: String::new(),
            blood_type: BloodType::OPositive,
            units_needed: 1,
            urgency: Urgency::High,
            hospital: "Bir".to_owned(),
            contact_person: String::new(),
            contact_phone: "98".to_owned(),
            required_by: String::new(),
            description: String::new(),
            requested_by: UserId::generate(),
            location: String::new(),
            city: city.to_owned(),
            district: String::new(),
            province: String::new(),
        }
        .into_request(BloodRequestId::generate(), now_micros());
        request.status = status;
        request
    }

    #[test]
    fn test_default_request_query_matches_active_only() {
        let query = RequestQuery::default();
        assert_eq!(query.limit, 20);
        assert!(query.matches(&request("Pokhara", RequestStatus::Active)));
        assert!(!query.matches(&request("Pokhara", RequestStatus::Fulfilled)));
    }

    #[test]
    fn test_request_query_city_filter() {
        let query = RequestQuery {
            city: Some("Kathmandu".to_owned()),
            ..RequestQuery::default()
        };
        assert!(query.matches(&request("Kathmandu", RequestStatus::Active)));
        assert!(!query.matches(&request("Pokhara", RequestStatus::Active)));
    }

    #[test]
    fn test_donor_query_defaults() {
        let query = DonorQuery::default();
        assert_eq!(query.limit, 50);
        assert!(query.active.is_none());
    }

    #[test]
    fn test_newest_first_sorts_and_truncates() {
        let now = now_micros();
        let mut stamps = vec![
            now - chrono::TimeDelta::seconds(2),
            now,
            now - chrono::TimeDelta::seconds(1),
        ];
        newest_first(&mut stamps, |t| *t, 2);
        assert_eq!(stamps, vec![now, now - chrono::TimeDelta::seconds(1)]);
    }

    #[test]
    fn test_stale_message_names_collection() {
        let err = StoreError::stale(collection::DONOR);
        assert!(err.to_string().contains("This donor was changed"));
    }
}
