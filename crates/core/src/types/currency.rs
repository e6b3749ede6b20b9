//! ISO 4217 style currency codes.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Errors that can occur when parsing a [`CurrencyCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CurrencyError {
    /// The code is not exactly three ASCII letters.
    #[error("currency code must be three letters, got {0:?}")]
    Invalid(String),
}

/// A three-letter currency code, stored upper case (`"DKK"`, `"USD"`).
///
/// Any three ASCII letters are accepted; the store does not convert between
/// currencies, so it has no reason to know the full ISO list.
///
/// ```
/// use bazaar_core::CurrencyCode;
///
/// let code: CurrencyCode = "usd".parse().unwrap();
/// assert_eq!(code.as_str(), "USD");
/// assert_eq!(code.to_lowercase(), "usd");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct CurrencyCode([u8; 3]);

impl CurrencyCode {
    /// Danish krone, the catalog default.
    pub const DKK: Self = Self(*b"DKK");

    /// Parse a currency code, ignoring case and surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `CurrencyError::Invalid` unless the input is three ASCII letters.
    pub fn parse(s: &str) -> Result<Self, CurrencyError> {
        let trimmed = s.trim();
        match trimmed.as_bytes() {
            &[a, b, c] if [a, b, c].iter().all(u8::is_ascii_alphabetic) => Ok(Self([
                a.to_ascii_uppercase(),
                b.to_ascii_uppercase(),
                c.to_ascii_uppercase(),
            ])),
            _ => Err(CurrencyError::Invalid(trimmed.to_owned())),
        }
    }

    /// Upper-case code as stored and displayed.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Only ASCII letters are ever stored.
        core::str::from_utf8(&self.0).unwrap_or("XXX")
    }

    /// Lower-case code, the form payment gateways expect.
    #[must_use]
    pub fn to_lowercase(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self::DKK
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurrencyCode {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.as_str().to_owned()
    }
}

impl<'de> Deserialize<'de> for CurrencyCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case() {
        assert_eq!(CurrencyCode::parse("dkk").unwrap(), CurrencyCode::DKK);
        assert_eq!(CurrencyCode::parse(" Eur ").unwrap().as_str(), "EUR");
    }

    #[test]
    fn test_parse_rejects_bad_codes() {
        assert!(CurrencyCode::parse("").is_err());
        assert!(CurrencyCode::parse("EURO").is_err());
        assert!(CurrencyCode::parse("U$D").is_err());
        assert!(CurrencyCode::parse("12A").is_err());
    }

    #[test]
    fn test_default_is_dkk() {
        assert_eq!(CurrencyCode::default().as_str(), "DKK");
    }

    #[test]
    fn test_serde() {
        let code = CurrencyCode::parse("usd").unwrap();
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"USD\"");
        let parsed: CurrencyCode = serde_json::from_str("\"gbp\"").unwrap();
        assert_eq!(parsed.as_str(), "GBP");
        assert!(serde_json::from_str::<CurrencyCode>("\"pounds\"").is_err());
    }
}
