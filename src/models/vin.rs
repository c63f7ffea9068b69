use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::VIN_LENGTH;

/// Vehicle identification number, the partition key of every crawl
///
/// **INVARIANT:** exactly 17 ASCII alphanumeric characters, uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Vin(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VinError {
    #[error("VIN must be 17 characters, got {0}")]
    Length(usize),
    #[error("VIN contains invalid character {0:?}")]
    Character(char),
}

impl Vin {
    /// Parse and normalize a VIN (trimmed, uppercased)
    pub fn parse(raw: &str) -> Result<Self, VinError> {
        let normalized = raw.trim().to_ascii_uppercase();
        let len = normalized.chars().count();
        if len != VIN_LENGTH {
            return Err(VinError::Length(len));
        }
        if let Some(bad) = normalized.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(VinError::Character(bad));
        }
        Ok(Self(normalized))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Collection name used by downstream stores for this VIN
    #[must_use]
    pub fn collection_name(&self) -> String {
        collection_name(&self.0)
    }
}

/// Collection name for a raw VIN string, matching [`Vin::collection_name`]
#[must_use]
pub fn collection_name(vin: &str) -> String {
    format!("elsadocs_{}", vin.trim().to_ascii_lowercase())
}

impl fmt::Display for Vin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Vin {
    type Err = VinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Vin {
    type Error = VinError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Vin> for String {
    fn from(vin: Vin) -> Self {
        vin.0
    }
}

impl AsRef<str> for Vin {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uppercases_and_trims() {
        let vin = Vin::parse(" wvwzzz1jzxw000001 ").expect("valid vin");
        assert_eq!(vin.as_str(), "WVWZZZ1JZXW000001");
        assert_eq!(vin.collection_name(), "elsadocs_wvwzzz1jzxw000001");
    }

    #[test]
    fn parse_rejects_wrong_length_and_symbols() {
        assert_eq!(Vin::parse("WVW123"), Err(VinError::Length(6)));
        assert_eq!(
            Vin::parse("WVWZZZ1JZXW00000-"),
            Err(VinError::Character('-'))
        );
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let ok: Vin = serde_json::from_str("\"wvwzzz1jzxw000001\"").expect("deserialize");
        assert_eq!(ok.as_str(), "WVWZZZ1JZXW000001");
        assert!(serde_json::from_str::<Vin>("\"short\"").is_err());
    }
}
