//! Caller-side validation.
//!
//! Forms are collected into `*Draft` types holding raw, possibly incomplete
//! input. `validate` turns a draft into the store input type or reports every
//! missing field at once, before any store call is issued.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{BloodRequest, Donor, NewBloodRequest, NewDonationRecord, NewDonor};
use crate::types::{BloodType, DonationStatus, Email, EmailError, Urgency, UserId};

/// Why a draft was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Required fields are blank. Holds the form labels in form order.
    #[error("Please fill all required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Invalid email address: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Units must be a positive number")]
    InvalidUnits,
}

impl ValidationError {
    /// The missing field labels, if this is a missing-fields error.
    #[must_use]
    pub fn missing_fields(&self) -> &[&'static str] {
        match self {
            Self::MissingFields(fields) => fields,
            _ => &[],
        }
    }
}

/// Collects labels of blank required fields.
#[derive(Default)]
struct Missing(Vec<&'static str>);

impl Missing {
    fn text(&mut self, label: &'static str, value: &str) {
        if value.trim().is_empty() {
            self.0.push(label);
        }
    }

    fn present<T>(&mut self, label: &'static str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.0.push(label);
        }
        value
    }

    fn positive(&mut self, label: &'static str, value: i32) {
        if value <= 0 {
            self.0.push(label);
        }
    }

    const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self.into_error())
        }
    }

    fn into_error(self) -> ValidationError {
        ValidationError::MissingFields(self.0)
    }
}

// =============================================================================
// Blood requests
// =============================================================================

/// Raw input of the "Request Blood" form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodRequestDraft {
    pub patient_name: String,
    pub gender: String,
    pub case_description: String,
    pub blood_type: Option<BloodType>,
    /// Zero or negative counts as missing.
    pub units_needed: i32,
    pub urgency: Option<Urgency>,
    pub hospital: String,
    pub contact_person: String,
    pub contact_phone: String,
    pub required_by: String,
    pub description: String,
    pub location: String,
    pub city: String,
    pub district: String,
    pub province: String,
}

impl BloodRequestDraft {
    /// Check required fields and attach the requesting user.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingFields`] listing every blank required
    /// field ("Patient Name", "Blood Type", "Units Needed", "Urgency",
    /// "Hospital", "Contact Phone").
    pub fn validate(self, requested_by: UserId) -> Result<NewBloodRequest, ValidationError> {
        let mut missing = Missing::default();
        missing.text("Patient Name", &self.patient_name);
        let blood_type = missing.present("Blood Type", self.blood_type);
        missing.positive("Units Needed", self.units_needed);
        let urgency = missing.present("Urgency", self.urgency);
        missing.text("Hospital", &self.hospital);
        missing.text("Contact Phone", &self.contact_phone);

        let (Some(blood_type), Some(urgency)) = (blood_type, urgency) else {
            return Err(missing.into_error());
        };
        if !missing.is_empty() {
            return Err(missing.into_error());
        }

        Ok(NewBloodRequest {
            patient_name: self.patient_name.trim().to_owned(),
            gender: self.gender,
            case_description: self.case_description,
            blood_type,
            units_needed: self.units_needed,
            urgency,
            hospital: self.hospital.trim().to_owned(),
            contact_person: self.contact_person,
            contact_phone: self.contact_phone.trim().to_owned(),
            required_by: self.required_by,
            description: self.description,
            requested_by,
            location: self.location,
            city: self.city.trim().to_owned(),
            district: self.district,
            province: self.province,
        })
    }
}

impl From<&BloodRequest> for BloodRequestDraft {
    fn from(request: &BloodRequest) -> Self {
        Self {
            patient_name: request.patient_name.clone(),
            gender: request.gender.clone(),
            case_description: request.case_description.clone(),
            blood_type: Some(request.blood_type),
            units_needed: request.units_needed,
            urgency: Some(request.urgency),
            hospital: request.hospital.clone(),
            contact_person: request.contact_person.clone(),
            contact_phone: request.contact_phone.clone(),
            required_by: request.required_by.clone(),
            description: request.description.clone(),
            location: request.location.clone(),
            city: request.city.clone(),
            district: request.district.clone(),
            province: request.province.clone(),
        }
    }
}

impl BloodRequest {
    /// Check an edited request against the same required fields as a new one.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingFields`] listing every blank required
    /// field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        BloodRequestDraft::from(self)
            .validate(self.requested_by)
            .map(|_| ())
    }
}

// =============================================================================
// Donors
// =============================================================================

/// Raw input of the "Register as Donor" dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonorDraft {
    pub name: String,
    pub blood_type: Option<BloodType>,
    pub city: String,
    pub phone_number: String,
    pub last_donation_date: String,
}

impl DonorDraft {
    /// Check required fields and attach the registering user.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingFields`] when name, blood type, city
    /// or phone is blank.
    pub fn validate(self, user_id: UserId) -> Result<NewDonor, ValidationError> {
        let mut missing = Missing::default();
        missing.text("Name", &self.name);
        let blood_type = missing.present("Blood Type", self.blood_type);
        missing.text("City", &self.city);
        missing.text("Phone", &self.phone_number);

        let Some(blood_type) = blood_type else {
            return Err(missing.into_error());
        };
        missing.finish()?;

        Ok(NewDonor {
            user_id,
            name: self.name.trim().to_owned(),
            blood_type,
            city: self.city.trim().to_owned(),
            phone_number: self.phone_number.trim().to_owned(),
            last_donation_date: self.last_donation_date,
        })
    }
}

impl From<&Donor> for DonorDraft {
    fn from(donor: &Donor) -> Self {
        Self {
            name: donor.name.clone(),
            blood_type: Some(donor.blood_type),
            city: donor.city.clone(),
            phone_number: donor.phone_number.clone(),
            last_donation_date: donor.last_donation_date.clone(),
        }
    }
}

impl Donor {
    /// Check an edited registration against the same required fields as a
    /// new one.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingFields`] when name, city or phone is
    /// blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        DonorDraft::from(self).validate(self.user_id).map(|_| ())
    }
}

// =============================================================================
// Donations
// =============================================================================

impl NewDonationRecord {
    /// Check that the record describes a real donation.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidUnits`] when `units` is not positive
    /// on a completed donation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if matches!(self.status, DonationStatus::Completed) && self.units <= 0 {
            return Err(ValidationError::InvalidUnits);
        }
        Ok(())
    }
}

// =============================================================================
// Sign-up
// =============================================================================

/// Raw input of the sign-up form.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SignUpDraft {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
}

impl std::fmt::Debug for SignUpDraft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignUpDraft")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("confirm_password", &"[REDACTED]")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("phone_number", &self.phone_number)
            .finish()
    }
}

/// A sign-up that passed form validation. Password strength is checked by
/// the auth provider.
#[derive(Clone, PartialEq, Eq)]
pub struct SignUp {
    pub email: Email,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
}

impl std::fmt::Debug for SignUp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignUp")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl SignUpDraft {
    /// Check the form: every field filled, email well-formed, passwords equal.
    ///
    /// # Errors
    ///
    /// Returns the first failing check as a [`ValidationError`].
    pub fn validate(self) -> Result<SignUp, ValidationError> {
        let mut missing = Missing::default();
        missing.text("First Name", &self.first_name);
        missing.text("Last Name", &self.last_name);
        missing.text("Email", &self.email);
        missing.text("Phone Number", &self.phone_number);
        missing.text("Password", &self.password);
        missing.text("Confirm Password", &self.confirm_password);
        missing.finish()?;

        let email = Email::parse(&self.email)?;
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }

        Ok(SignUp {
            email,
            password: self.password,
            first_name: self.first_name.trim().to_owned(),
            last_name: self.last_name.trim().to_owned(),
            phone_number: self.phone_number.trim().to_owned(),
        })
    }
}
