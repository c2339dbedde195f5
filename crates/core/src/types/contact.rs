//! Contact data newtypes: email, Brazilian postal code (CEP) and phone.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing contact data.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    /// The input string is empty.
    #[error("value cannot be empty")]
    Empty,
    /// The email is longer than allowed.
    #[error("email must be at most {max} characters")]
    EmailTooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The email is not `local@domain.tld`.
    #[error("email must look like name@domain.com")]
    MalformedEmail,
    /// The postal code is not 8 digits.
    #[error("postal code must have 8 digits")]
    MalformedPostalCode,
    /// The phone number is not 10 or 11 digits.
    #[error("phone must have area code and 8 or 9 digits")]
    MalformedPhone,
}

/// An email address, trimmed and lower-cased.
///
/// ```
/// use vitrine_core::Email;
///
/// assert_eq!(Email::parse(" Ana@Example.com ").unwrap().as_str(), "ana@example.com");
/// assert!(Email::parse("ana@localhost").is_err());
/// assert!(Email::parse("@example.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse and normalize an `Email`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, or does not have
    /// exactly one `@` with a non-empty local part and a dotted domain.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ContactError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(ContactError::EmailTooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let (local, domain) = s.split_once('@').ok_or(ContactError::MalformedEmail)?;
        let domain_ok = !domain.contains('@')
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.');
        if local.is_empty() || !domain_ok || s.contains(char::is_whitespace) {
            return Err(ContactError::MalformedEmail);
        }

        Ok(Self(s.to_lowercase()))
    }

    /// Returns the email address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = ContactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A Brazilian postal code (CEP), stored as its 8 digits.
///
/// Accepts `01310100` and `01310-100`; displays as `01310-100`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PostalCode(String);

impl PostalCode {
    /// Number of digits in a CEP.
    pub const DIGITS: usize = 8;

    /// Parse a postal code in either plain or hyphenated form.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or not `NNNNNNNN`/`NNNNN-NNN`.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ContactError::Empty);
        }

        let digits: String = match s.split_once('-') {
            Some((head, tail)) if head.len() == 5 && tail.len() == 3 => format!("{head}{tail}"),
            Some(_) => return Err(ContactError::MalformedPostalCode),
            None => s.to_owned(),
        };

        if digits.len() != Self::DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ContactError::MalformedPostalCode);
        }
        Ok(Self(digits))
    }

    /// The 8 digits without formatting.
    #[must_use]
    pub fn digits(&self) -> &str {
        &self.0
    }

    /// The numeric value of the code, used for range lookups.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0.parse().unwrap_or(0)
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (head, tail) = self.0.split_at(5);
        write!(f, "{head}-{tail}")
    }
}

/// A Brazilian phone number: two-digit area code plus 8 or 9 digits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Phone(String);

impl Phone {
    /// Parse a phone number, ignoring punctuation and an optional `+55` prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or does not reduce to 10 or 11
    /// digits with a valid area code.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ContactError::Empty);
        }

        let mut digits: String = s.chars().filter(char::is_ascii_digit).collect();
        if s.starts_with('+') {
            digits = digits
                .strip_prefix("55")
                .ok_or(ContactError::MalformedPhone)?
                .to_owned();
        }

        let area_ok = digits
            .get(..2)
            .is_some_and(|area| !area.starts_with('0'));
        if !(10..=11).contains(&digits.len()) || !area_ok {
            return Err(ContactError::MalformedPhone);
        }
        Ok(Self(digits))
    }

    /// The digits without formatting.
    #[must_use]
    pub fn digits(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (area, number) = self.0.split_at(2);
        let (first, second) = number.split_at(number.len() - 4);
        write!(f, "({area}) {first}-{second}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalizes() {
        let email = Email::parse("  Maria.Silva@Loja.COM.br ").unwrap();
        assert_eq!(email.as_str(), "maria.silva@loja.com.br");
    }

    #[test]
    fn test_email_rejections() {
        assert_eq!(Email::parse(""), Err(ContactError::Empty));
        assert_eq!(Email::parse("no-at"), Err(ContactError::MalformedEmail));
        assert_eq!(Email::parse("a@b@c.com"), Err(ContactError::MalformedEmail));
        assert_eq!(Email::parse("a@.com"), Err(ContactError::MalformedEmail));
        assert_eq!(Email::parse("a b@c.com"), Err(ContactError::MalformedEmail));
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(matches!(
            Email::parse(&long),
            Err(ContactError::EmailTooLong { .. })
        ));
    }

    #[test]
    fn test_postal_code_forms() {
        let plain = PostalCode::parse("01310100").unwrap();
        let hyphen = PostalCode::parse("01310-100").unwrap();
        assert_eq!(plain, hyphen);
        assert_eq!(plain.to_string(), "01310-100");
        assert_eq!(plain.value(), 1_310_100);
    }

    #[test]
    fn test_postal_code_rejections() {
        assert_eq!(
            PostalCode::parse("0131010"),
            Err(ContactError::MalformedPostalCode)
        );
        assert_eq!(
            PostalCode::parse("0131-0100"),
            Err(ContactError::MalformedPostalCode)
        );
        assert_eq!(
            PostalCode::parse("0131A100"),
            Err(ContactError::MalformedPostalCode)
        );
    }

    #[test]
    fn test_phone_formats() {
        assert_eq!(
            Phone::parse("(11) 98765-4321").unwrap().to_string(),
            "(11) 98765-4321"
        );
        assert_eq!(
            Phone::parse("+55 21 3456-7890").unwrap().to_string(),
            "(21) 3456-7890"
        );
        assert_eq!(Phone::parse("11987654321").unwrap().digits(), "11987654321");
    }

    #[test]
    fn test_phone_rejections() {
        assert_eq!(Phone::parse("12345"), Err(ContactError::MalformedPhone));
        assert_eq!(
            Phone::parse("01 98765-4321"),
            Err(ContactError::MalformedPhone)
        );
        assert_eq!(
            Phone::parse("+1 415 555 0100"),
            Err(ContactError::MalformedPhone)
        );
    }
}
