//! Documents held by the stores.
//!
//! Each collection has a stored type carrying the store-assigned id and
//! timestamps (`UserProfile`, `BloodRequest`, `Donor`, `DonationRecord`) and,
//! where the store assigns the id, a `New*` type carrying what the caller
//! supplies at creation.

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    BloodRequestId, BloodType, DonationId, DonationStatus, DonorId, RequestStatus, Urgency, UserId,
};

/// Current time truncated to the microsecond precision `PostgreSQL` keeps,
/// so timestamps compare equal after a database round trip.
#[must_use]
pub fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Timestamp for a mutation of a document last touched at `previous`.
///
/// Always strictly later than `previous`, even when the clock has not
/// advanced past it.
#[must_use]
pub fn next_update_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = now_micros();
    let floor = previous + TimeDelta::microseconds(1);
    if now > floor { now } else { floor }
}

// =============================================================================
// Users
// =============================================================================

/// A user's profile, keyed by the authenticated principal's id.
///
/// Optional text fields are blank rather than absent, matching how profiles
/// are created at sign-up with only name, email and phone filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct UserProfile {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub blood_type: Option<BloodType>,
    pub date_of_birth: String,
    pub address: String,
    pub city: String,
    pub district: String,
    pub province: String,
    pub is_verified: bool,
    pub is_active: bool,
    pub profile_picture: String,
    pub last_donation_date: String,
    pub total_donations: i32,
    pub emergency_contact: String,
    pub medical_conditions: String,
    pub preferred_language: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Default language for new profiles.
    pub const DEFAULT_LANGUAGE: &'static str = "en";

    /// A profile with every optional field blank-defaulted.
    #[must_use]
    pub fn blank(id: UserId) -> Self {
        let now = now_micros();
        Self {
            id,
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            phone_number: String::new(),
            blood_type: None,
            date_of_birth: String::new(),
            address: String::new(),
            city: String::new(),
            district: String::new(),
            province: String::new(),
            is_verified: false,
            is_active: true,
            profile_picture: String::new(),
            last_donation_date: String::new(),
            total_donations: 0,
            emergency_contact: String::new(),
            medical_conditions: String::new(),
            preferred_language: Self::DEFAULT_LANGUAGE.to_owned(),
            created_at: now,
            updated_at: now,
        }
    }

    /// First and last name joined by a space, trimmed.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_owned()
    }
}

// =============================================================================
// Blood requests
// =============================================================================

/// A post describing a patient's need for blood.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct BloodRequest {
    pub id: BloodRequestId,
    pub patient_name: String,
    pub gender: String,
    pub case_description: String,
    pub blood_type: BloodType,
    pub units_needed: i32,
    pub urgency: Urgency,
    pub hospital: String,
    pub contact_person: String,
    pub contact_phone: String,
    pub required_by: String,
    pub description: String,
    pub requested_by: UserId,
    pub status: RequestStatus,
    pub location: String,
    pub city: String,
    pub district: String,
    pub province: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied fields of a blood request. Produced by
/// [`crate::validation::BloodRequestDraft::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBloodRequest {
    pub patient_name: String,
    pub gender: String,
    pub case_description: String,
    pub blood_type: BloodType,
    pub units_needed: i32,
    pub urgency: Urgency,
    pub hospital: String,
    pub contact_person: String,
    pub contact_phone: String,
    pub required_by: String,
    pub description: String,
    pub requested_by: UserId,
    pub location: String,
    pub city: String,
    pub district: String,
    pub province: String,
}

impl NewBloodRequest {
    /// Materialise the stored document with a store-assigned id.
    #[must_use]
    pub fn into_request(self, id: BloodRequestId, now: DateTime<Utc>) -> BloodRequest {
        BloodRequest {
            id,
            patient_name: self.patient_name,
            gender: self.gender,
            case_description: self.case_description,
            blood_type: self.blood_type,
            units_needed: self.units_needed,
            urgency: self.urgency,
            hospital: self.hospital,
            contact_person: self.contact_person,
            contact_phone: self.contact_phone,
            required_by: self.required_by,
            description: self.description,
            requested_by: self.requested_by,
            status: RequestStatus::Active,
            location: self.location,
            city: self.city,
            district: self.district,
            province: self.province,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Donors
// =============================================================================

/// A user's registration as a donor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Donor {
    pub id: DonorId,
    pub user_id: UserId,
    pub name: String,
    pub blood_type: BloodType,
    pub city: String,
    pub phone_number: String,
    pub last_donation_date: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied fields of a donor registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDonor {
    pub user_id: UserId,
    pub name: String,
    pub blood_type: BloodType,
    pub city: String,
    pub phone_number: String,
    pub last_donation_date: String,
}

impl NewDonor {
    /// Materialise the stored document. New donors start active.
    #[must_use]
    pub fn into_donor(self, id: DonorId, now: DateTime<Utc>) -> Donor {
        Donor {
            id,
            user_id: self.user_id,
            name: self.name,
            blood_type: self.blood_type,
            city: self.city,
            phone_number: self.phone_number,
            last_donation_date: self.last_donation_date,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Donations
// =============================================================================

/// A historical donation linking a donor to a recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct DonationRecord {
    pub id: DonationId,
    pub donor_id: UserId,
    pub recipient_id: UserId,
    pub blood_type: BloodType,
    pub units: i32,
    pub donation_date: String,
    pub hospital: String,
    pub notes: String,
    pub status: DonationStatus,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied fields of a donation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDonationRecord {
    pub donor_id: UserId,
    pub recipient_id: UserId,
    pub blood_type: BloodType,
    pub units: i32,
    pub donation_date: String,
    pub hospital: String,
    pub notes: String,
    pub status: DonationStatus,
}

impl NewDonationRecord {
    /// Materialise the stored document with a store-assigned id.
    #[must_use]
    pub fn into_record(self, id: DonationId, now: DateTime<Utc>) -> DonationRecord {
        DonationRecord {
            id,
            donor_id: self.donor_id,
            recipient_id: self.recipient_id,
            blood_type: self.blood_type,
            units: self.units,
            donation_date: self.donation_date,
            hospital: self.hospital,
            notes: self.notes,
            status: self.status,
            created_at: now,
        }
    }
}

/// Totals over a donor's completed donations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonorStats {
    pub total_donations: i64,
    pub total_units: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_profile_defaults() {
        let id = UserId::generate();
        let profile = UserProfile::blank(id);
        assert_eq!(profile.id, id);
        assert!(profile.first_name.is_empty());
        assert!(profile.blood_type.is_none());
        assert!(profile.is_active);
        assert!(!profile.is_verified);
        assert_eq!(profile.preferred_language, "en");
        assert_eq!(profile.total_donations, 0);
    }

    #[test]
    fn test_full_name_trims_missing_parts() {
        let mut profile = UserProfile::blank(UserId::generate());
        profile.first_name = "Ram".to_owned();
        assert_eq!(profile.full_name(), "Ram");
        profile.last_name = "Thapa".to_owned();
        assert_eq!(profile.full_name(), "Ram Thapa");
    }

    #[test]
    fn test_next_update_timestamp_is_strictly_later() {
        let future = now_micros() + TimeDelta::seconds(60);
        let next = next_update_timestamp(future);
        assert!(next > future);
        assert_eq!(next - future, TimeDelta::microseconds(1));

        let past = now_micros() - TimeDelta::seconds(60);
        assert!(next_update_timestamp(past) > past + TimeDelta::seconds(59));
    }

    #[test]
    fn test_new_donor_starts_active() {
        let now = now_micros();
        let donor = NewDonor {
            user_id: UserId::generate(),
            name: "Ram".to_owned(),
            blood_type: BloodType::BPositive,
            city: "Kathmandu".to_owned(),
            phone_number: "9800000000".to_owned(),
            last_donation_date: String::new(),
        }
        .into_donor(DonorId::generate(), now);
        assert!(donor.active);
        assert_eq!(donor.created_at, donor.updated_at);
    }
}
