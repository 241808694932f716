//! Device identity using prefixed ULIDs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

/// Prefix shared by every device identifier
pub const DEVICE_PREFIX: &str = "DEV";

/// A unique device identifier (`DEV-<ULID>`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId {
    ulid: Ulid,
}

impl DeviceId {
    /// Create a new, time-ordered DeviceId
    pub fn new() -> Self {
        Self { ulid: Ulid::new() }
    }

    /// Create a DeviceId from an existing ULID
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self { ulid }
    }

    /// Get the ULID component
    pub fn ulid(&self) -> Ulid {
        self.ulid
    }

    /// Parse a DeviceId from a string
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        s.parse()
    }

    /// True if `fragment` is a case-insensitive prefix of this id (with or
    /// without the `DEV-` part)
    pub fn matches_prefix(&self, fragment: &str) -> bool {
        if fragment.is_empty() {
            return false;
        }
        let full = self.to_string();
        let upper = fragment.to_ascii_uppercase();
        full.starts_with(&upper) || self.ulid.to_string().starts_with(&upper)
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", DEVICE_PREFIX, self.ulid)
    }
}

impl FromStr for DeviceId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, ulid_str) = s
            .split_once('-')
            .ok_or_else(|| IdParseError::MissingDelimiter(s.to_string()))?;

        if !prefix.eq_ignore_ascii_case(DEVICE_PREFIX) {
            return Err(IdParseError::InvalidPrefix(prefix.to_string()));
        }

        let ulid = Ulid::from_string(ulid_str)
            .map_err(|e| IdParseError::InvalidUlid(ulid_str.to_string(), e.to_string()))?;

        Ok(Self { ulid })
    }
}

impl Serialize for DeviceId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DeviceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur when parsing device IDs
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdParseError {
    #[error("invalid device id prefix: '{0}' (expected DEV)")]
    InvalidPrefix(String),

    #[error("missing '-' delimiter in device id: '{0}'")]
    MissingDelimiter(String),

    #[error("invalid ULID '{0}': {1}")]
    InvalidUlid(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_generation() {
        let id = DeviceId::new();
        assert!(id.to_string().starts_with("DEV-"));
        assert_eq!(id.to_string().len(), 30); // DEV- (4) + ULID (26)
    }

    #[test]
    fn test_device_id_roundtrip() {
        let original = DeviceId::new();
        let parsed = DeviceId::parse(&original.to_string()).unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_device_id_lowercase_prefix() {
        let original = DeviceId::new();
        let lower = original.to_string().replacen("DEV", "dev", 1);
        assert_eq!(DeviceId::parse(&lower).unwrap(), original);
    }

    #[test]
    fn test_device_id_invalid_prefix() {
        let err = DeviceId::parse("REQ-01HQ3K4N5M6P7R8S9T0VWXYZAB").unwrap_err();
        assert!(matches!(err, IdParseError::InvalidPrefix(_)));
    }

    #[test]
    fn test_device_id_missing_delimiter() {
        let err = DeviceId::parse("DEV01HQ3K4N5M6P7R8S9T0VWXYZAB").unwrap_err();
        assert!(matches!(err, IdParseError::MissingDelimiter(_)));
    }

    #[test]
    fn test_device_id_invalid_ulid() {
        let err = DeviceId::parse("DEV-notaulid").unwrap_err();
        assert!(matches!(err, IdParseError::InvalidUlid(_, _)));
    }

    #[test]
    fn test_matches_prefix() {
        let id = DeviceId::new();
        let full = id.to_string();
        assert!(id.matches_prefix(&full[..8]));
        assert!(id.matches_prefix(&full[4..10].to_lowercase()));
        assert!(!id.matches_prefix(""));
        assert!(!id.matches_prefix("DEV-ZZZZZZZZ"));
    }
}
