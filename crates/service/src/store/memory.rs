//! In-process store backend.
//!
//! Implements every store contract over `RwLock`-guarded maps with the same
//! semantics as the `PostgreSQL` backend. Used by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use blood_for_nepal_core::{
    BloodRequest, BloodRequestId, BloodType, DonationId, DonationRecord, DonationStatus, Donor,
    DonorId, DonorStats, Email, NewBloodRequest, NewDonationRecord, NewDonor, RequestStatus,
    UserId, UserProfile, next_update_timestamp, now_micros,
};

use super::{
    Account, AccountStore, ActiveChange, DonationStore, DonorQuery, DonorStore, ProfileStore,
    RequestQuery, RequestStore, StoreError, collection, newest_first,
};

#[derive(Debug, Clone)]
struct ResetTokenRow {
    user_id: UserId,
    expires_at: DateTime<Utc>,
    used: bool,
}

/// All collections held in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    profiles: RwLock<HashMap<UserId, UserProfile>>,
    requests: RwLock<HashMap<BloodRequestId, BloodRequest>>,
    donors: RwLock<HashMap<DonorId, Donor>>,
    donations: RwLock<Vec<DonationRecord>>,
    accounts: RwLock<HashMap<UserId, Account>>,
    reset_tokens: RwLock<HashMap<String, ResetTokenRow>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryBackend {
    async fn save(&self, profile: &UserProfile) -> Result<UserProfile, StoreError> {
        let mut profiles = self.profiles.write().await;
        let mut saved = profile.clone();
        if let Some(existing) = profiles.get(&profile.id) {
            saved.created_at = existing.created_at;
            saved.updated_at = next_update_timestamp(existing.updated_at);
        } else {
            saved.updated_at = now_micros().max(saved.created_at);
        }
        profiles.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn get(&self, id: UserId) -> Result<UserProfile, StoreError> {
        let mut profiles = self.profiles.write().await;
        Ok(profiles
            .entry(id)
            .or_insert_with(|| UserProfile::blank(id))
            .clone())
    }

    async fn update(&self, profile: &UserProfile) -> Result<UserProfile, StoreError> {
        let mut profiles = self.profiles.write().await;
        let stored = profiles
            .get_mut(&profile.id)
            .ok_or_else(|| StoreError::not_found(collection::PROFILE, profile.id))?;
        if stored.updated_at != profile.updated_at {
            return Err(StoreError::stale(collection::PROFILE));
        }

        let created_at = stored.created_at;
        let updated_at = next_update_timestamp(stored.updated_at);
        *stored = UserProfile {
            created_at,
            updated_at,
            ..profile.clone()
        };
        Ok(stored.clone())
    }

    async fn search_donor_ids(
        &self,
        blood_type: BloodType,
        city: Option<&str>,
    ) -> Result<Vec<UserId>, StoreError> {
        let profiles = self.profiles.read().await;
        let mut found: Vec<&UserProfile> = profiles
            .values()
            .filter(|p| p.is_active && p.blood_type == Some(blood_type))
            .filter(|p| city.is_none_or(|c| p.city == c))
            .collect();
        found.sort_by_key(|p| std::cmp::Reverse(p.created_at));
        Ok(found.into_iter().map(|p| p.id).collect())
    }
}

#[async_trait]
impl RequestStore for MemoryBackend {
    async fn create(&self, request: NewBloodRequest) -> Result<BloodRequest, StoreError> {
        let request = request.into_request(BloodRequestId::generate(), now_micros());
        self.requests
            .write()
            .await
            .insert(request.id, request.clone());
        Ok(request)
    }

    async fn get(&self, id: BloodRequestId) -> Result<BloodRequest, StoreError> {
        self.requests
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(collection::BLOOD_REQUEST, id))
    }

    async fn update(&self, request: &BloodRequest) -> Result<BloodRequest, StoreError> {
        let mut requests = self.requests.write().await;
        let stored = requests
            .get_mut(&request.id)
            .ok_or_else(|| StoreError::not_found(collection::BLOOD_REQUEST, request.id))?;
        if stored.updated_at != request.updated_at {
            return Err(StoreError::stale(collection::BLOOD_REQUEST));
        }

        *stored = BloodRequest {
            requested_by: stored.requested_by,
            created_at: stored.created_at,
            updated_at: next_update_timestamp(stored.updated_at),
            ..request.clone()
        };
        Ok(stored.clone())
    }

    async fn set_status(
        &self,
        id: BloodRequestId,
        status: RequestStatus,
    ) -> Result<BloodRequest, StoreError> {
        let mut requests = self.requests.write().await;
        let stored = requests
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(collection::BLOOD_REQUEST, id))?;
        stored.status = status;
        stored.updated_at = next_update_timestamp(stored.updated_at);
        Ok(stored.clone())
    }

    async fn list(&self, query: &RequestQuery) -> Result<Vec<BloodRequest>, StoreError> {
        let mut found: Vec<BloodRequest> = self
            .requests
            .read()
            .await
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        newest_first(&mut found, |r| r.created_at, query.limit);
        Ok(found)
    }
}

#[async_trait]
impl DonorStore for MemoryBackend {
    async fn create(&self, donor: NewDonor) -> Result<Donor, StoreError> {
        let mut donors = self.donors.write().await;
        if donors.values().any(|d| d.user_id == donor.user_id) {
            return Err(StoreError::Conflict(
                "You are already registered as a donor".to_owned(),
            ));
        }
        let donor = donor.into_donor(DonorId::generate(), now_micros());
        donors.insert(donor.id, donor.clone());
        Ok(donor)
    }

    async fn get(&self, id: DonorId) -> Result<Donor, StoreError> {
        self.donors
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(collection::DONOR, id))
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Option<Donor>, StoreError> {
        Ok(self
            .donors
            .read()
            .await
            .values()
            .find(|d| d.user_id == user_id)
            .cloned())
    }

    async fn update(&self, donor: &Donor) -> Result<Donor, StoreError> {
        let mut donors = self.donors.write().await;
        let stored = donors
            .get_mut(&donor.id)
            .ok_or_else(|| StoreError::not_found(collection::DONOR, donor.id))?;
        if stored.updated_at != donor.updated_at {
            return Err(StoreError::stale(collection::DONOR));
        }

        *stored = Donor {
            user_id: stored.user_id,
            created_at: stored.created_at,
            updated_at: next_update_timestamp(stored.updated_at),
            ..donor.clone()
        };
        Ok(stored.clone())
    }

    async fn set_active(&self, id: DonorId, active: bool) -> Result<ActiveChange, StoreError> {
        let mut donors = self.donors.write().await;
        let stored = donors
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(collection::DONOR, id))?;
        let changed = stored.active != active;
        if changed {
            stored.active = active;
            stored.updated_at = next_update_timestamp(stored.updated_at);
        }
        Ok(ActiveChange {
            donor: stored.clone(),
            changed,
        })
    }

    async fn list(&self, query: &DonorQuery) -> Result<Vec<Donor>, StoreError> {
        let mut found: Vec<Donor> = self
            .donors
            .read()
            .await
            .values()
            .filter(|d| query.matches(d))
            .cloned()
            .collect();
        newest_first(&mut found, |d| d.created_at, query.limit);
        Ok(found)
    }
}

#[async_trait]
impl DonationStore for MemoryBackend {
    async fn create(&self, record: NewDonationRecord) -> Result<DonationRecord, StoreError> {
        let record = record.into_record(DonationId::generate(), now_micros());
        self.donations.write().await.push(record.clone());
        Ok(record)
    }

    async fn history(&self, donor_id: UserId) -> Result<Vec<DonationRecord>, StoreError> {
        let mut found: Vec<DonationRecord> = self
            .donations
            .read()
            .await
            .iter()
            .filter(|d| d.donor_id == donor_id)
            .cloned()
            .collect();
        newest_first(&mut found, |d| d.created_at, u32::MAX);
        Ok(found)
    }

    async fn stats(&self, donor_id: UserId) -> Result<DonorStats, StoreError> {
        let donations = self.donations.read().await;
        Ok(donations
            .iter()
            .filter(|d| d.donor_id == donor_id && d.status == DonationStatus::Completed)
            .fold(DonorStats::default(), |acc, d| DonorStats {
                total_donations: acc.total_donations + 1,
                total_units: acc.total_units + i64::from(d.units),
            }))
    }
}

#[async_trait]
impl AccountStore for MemoryBackend {
    async fn create_account(
        &self,
        email: &Email,
        password_hash: &str,
    ) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write().await;
        if accounts.values().any(|a| a.email == *email) {
            return Err(StoreError::Conflict("email already exists".to_owned()));
        }
        let account = Account {
            user_id: UserId::generate(),
            email: email.clone(),
            password_hash: password_hash.to_owned(),
            created_at: now_micros(),
        };
        accounts.insert(account.user_id, account.clone());
        Ok(account)
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<Account>, StoreError> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|a| a.email == *email)
            .cloned())
    }

    async fn set_password_hash(
        &self,
        user_id: UserId,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::not_found(collection::ACCOUNT, user_id))?;
        password_hash.clone_into(&mut account.password_hash);
        Ok(())
    }

    async fn insert_reset_token(
        &self,
        user_id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.reset_tokens.write().await.insert(
            token_hash.to_owned(),
            ResetTokenRow {
                user_id,
                expires_at,
                used: false,
            },
        );
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, StoreError> {
        let mut tokens = self.reset_tokens.write().await;
        let Some(row) = tokens.get_mut(token_hash) else {
            return Ok(None);
        };
        if row.used || row.expires_at <= now {
            return Ok(None);
        }
        row.used = true;
        Ok(Some(row.user_id))
    }
}
