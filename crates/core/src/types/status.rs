//! Lifecycle and priority enums.
//!
//! All three serialise as `SCREAMING_SNAKE_CASE` strings (`"HIGH"`,
//! `"FULFILLED"`, ...) and map to `PostgreSQL` enum types in the `bfn` schema.

use serde::{Deserialize, Serialize};

/// How soon a blood request needs to be met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "bfn.urgency", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    High,
    #[default]
    Medium,
    Low,
}

/// Lifecycle of a blood request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "bfn.request_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    /// Open and shown in listings.
    #[default]
    Active,
    /// Enough blood was found.
    Fulfilled,
    /// Withdrawn by the requester.
    Cancelled,
}

/// Outcome of a recorded donation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "bfn.donation_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DonationStatus {
    #[default]
    Completed,
    Cancelled,
}

/// Implements `Display`/`FromStr` over the wire names. Parsing is
/// case-insensitive so CLI input like `high` works.
macro_rules! wire_names {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// The wire/database name of this value.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($name => Ok(Self::$variant),)+
                    _ => Err(format!(
                        concat!("invalid ", stringify!($ty), ": {}"),
                        s
                    )),
                }
            }
        }
    };
}

wire_names!(Urgency {
    High => "HIGH",
    Medium => "MEDIUM",
    Low => "LOW",
});

wire_names!(RequestStatus {
    Active => "ACTIVE",
    Fulfilled => "FULFILLED",
    Cancelled => "CANCELLED",
});

wire_names!(DonationStatus {
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_urgency_parses_lowercase() {
        assert_eq!("high".parse::<Urgency>().unwrap(), Urgency::High);
        assert_eq!(" Low ".parse::<Urgency>().unwrap(), Urgency::Low);
        assert!("urgent".parse::<Urgency>().is_err());
    }

    #[test]
    fn test_request_status_default_is_active() {
        assert_eq!(RequestStatus::default(), RequestStatus::Active);
    }

    #[test]
    fn test_status_json_matches_display() {
        for status in [
            RequestStatus::Active,
            RequestStatus::Fulfilled,
            RequestStatus::Cancelled,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }

    #[test]
    fn test_donation_status_error_names_type() {
        let err = "pending".parse::<DonationStatus>().unwrap_err();
        assert_eq!(err, "invalid DonationStatus: pending");
    }
}
