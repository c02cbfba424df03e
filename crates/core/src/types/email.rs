//! Email address type used as the sign-in identity.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`Email`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    /// The input is empty or only whitespace.
    #[error("email cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("email must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input does not contain exactly one @ symbol.
    #[error("email must contain exactly one @ symbol")]
    InvalidAtSymbol,
    /// The local part (before @) is empty.
    #[error("email local part cannot be empty")]
    EmptyLocalPart,
    /// The domain part (after @) has no dot or an empty label.
    #[error("email domain is invalid")]
    InvalidDomain,
    /// The address contains whitespace.
    #[error("email cannot contain whitespace")]
    ContainsWhitespace,
}

/// A normalised email address.
///
/// Surrounding whitespace is trimmed and the whole address is lowercased, so
/// `" Ram@Example.COM "` and `"ram@example.com"` identify the same account.
///
/// ```
/// use blood_for_nepal_core::Email;
///
/// let email = Email::parse("  Ram@Example.com ").unwrap();
/// assert_eq!(email.as_str(), "ram@example.com");
///
/// assert!(Email::parse("ram@localhost").is_err()); // no dot in domain
/// assert!(Email::parse("ram@@example.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse and normalise an `Email`.
    ///
    /// # Errors
    ///
    /// Returns an [`EmailError`] describing the first structural problem found.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(EmailError::Empty);
        }
        if trimmed.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(EmailError::ContainsWhitespace);
        }

        let (local, domain) = trimmed
            .split_once('@')
            .ok_or(EmailError::InvalidAtSymbol)?;
        if domain.contains('@') {
            return Err(EmailError::InvalidAtSymbol);
        }
        if local.is_empty() {
            return Err(EmailError::EmptyLocalPart);
        }
        if !domain.contains('.') || domain.split('.').any(str::is_empty) {
            return Err(EmailError::InvalidDomain);
        }

        Ok(Self(trimmed.to_lowercase()))
    }

    /// Returns the email address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Email` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Returns the domain part of the email (after the @).
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split_once('@').map_or("", |(_, domain)| domain)
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Email {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Email {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(&s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Email {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalises_case_and_whitespace() {
        let email = Email::parse("\tSita.Sharma@Gmail.COM ").unwrap();
        assert_eq!(email.as_str(), "sita.sharma@gmail.com");
        assert_eq!(email.domain(), "gmail.com");
    }

    #[test]
    fn test_rejects_blank() {
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));
    }

    #[test]
    fn test_rejects_double_at() {
        assert_eq!(
            Email::parse("a@b@example.com"),
            Err(EmailError::InvalidAtSymbol)
        );
        assert_eq!(Email::parse("no-at.example.com"), Err(EmailError::InvalidAtSymbol));
    }

    #[test]
    fn test_rejects_bad_domain() {
        assert_eq!(Email::parse("ram@nepal"), Err(EmailError::InvalidDomain));
        assert_eq!(Email::parse("ram@nepal."), Err(EmailError::InvalidDomain));
        assert_eq!(Email::parse("ram@.np"), Err(EmailError::InvalidDomain));
    }

    #[test]
    fn test_rejects_inner_whitespace() {
        assert_eq!(
            Email::parse("ram bahadur@example.com"),
            Err(EmailError::ContainsWhitespace)
        );
    }

    #[test]
    fn test_rejects_too_long() {
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(matches!(Email::parse(&long), Err(EmailError::TooLong { .. })));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Email = serde_json::from_str("\"Hari@Example.org\"").unwrap();
        assert_eq!(ok.as_str(), "hari@example.org");
        assert!(serde_json::from_str::<Email>("\"not-an-email\"").is_err());
    }
}
