//! ABO/Rh blood groups.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a string is not one of the eight blood groups.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown blood type: {0:?} (expected one of A+, A-, B+, B-, AB+, AB-, O+, O-)")]
pub struct BloodTypeError(pub String);

/// A blood group, stored and serialised by its display name (`"O+"`, `"AB-"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BloodType {
    APositive,
    ANegative,
    BPositive,
    BNegative,
    AbPositive,
    AbNegative,
    OPositive,
    ONegative,
}

impl BloodType {
    /// All blood groups in the order the pickers list them.
    pub const ALL: [Self; 8] = [
        Self::APositive,
        Self::ANegative,
        Self::BPositive,
        Self::BNegative,
        Self::AbPositive,
        Self::AbNegative,
        Self::OPositive,
        Self::ONegative,
    ];

    /// The display name, e.g. `"AB+"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::APositive => "A+",
            Self::ANegative => "A-",
            Self::BPositive => "B+",
            Self::BNegative => "B-",
            Self::AbPositive => "AB+",
            Self::AbNegative => "AB-",
            Self::OPositive => "O+",
            Self::ONegative => "O-",
        }
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodType {
    type Err = BloodTypeError;

    /// Accepts the display name in any case, with surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|bt| bt.as_str() == wanted)
            .ok_or_else(|| BloodTypeError(s.to_owned()))
    }
}

impl TryFrom<String> for BloodType {
    type Error = BloodTypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BloodType> for String {
    fn from(bt: BloodType) -> Self {
        bt.as_str().to_owned()
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for BloodType {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for BloodType {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for BloodType {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("ab-".parse::<BloodType>().unwrap(), BloodType::AbNegative);
        assert_eq!(" o+ ".parse::<BloodType>().unwrap(), BloodType::OPositive);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "C+".parse::<BloodType>().unwrap_err();
        assert_eq!(err, BloodTypeError("C+".to_owned()));
        assert!("".parse::<BloodType>().is_err());
    }

    #[test]
    fn test_every_display_name_parses_back() {
        for bt in BloodType::ALL {
            assert_eq!(bt.to_string().parse::<BloodType>().unwrap(), bt);
        }
    }

    #[test]
    fn test_serialises_as_display_name() {
        let json = serde_json::to_string(&BloodType::BPositive).unwrap();
        assert_eq!(json, "\"B+\"");
        let back: BloodType = serde_json::from_str("\"O-\"").unwrap();
        assert_eq!(back, BloodType::ONegative);
    }
}
