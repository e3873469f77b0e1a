//! Canonical point-in-time value — the temporal axis of the store.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// An immutable instant, serialized everywhere as an RFC 3339 string.
///
/// Timestamps appear both as query parameters and as property values on
/// versioned edge records, so the string form is the canonical one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The current instant.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse from the canonical string form.
    pub fn parse(s: &str) -> Result<Self> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| Error::Timestamp(format!("{s:?}: {e}")))
    }

    /// Resolve an optional timestamp, defaulting to "now".
    pub fn resolve(at: Option<Timestamp>) -> Self {
        at.unwrap_or_else(Self::now)
    }

    /// Canonical string form, microsecond precision, UTC designator `Z`.
    pub fn to_string_canonical(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Shift by whole seconds. Handy for constructing historical fixtures.
    pub fn add_seconds(&self, seconds: i64) -> Self {
        Self(self.0 + chrono::Duration::seconds(seconds))
    }

    pub fn inner(&self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl std::str::FromStr for Timestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        let ts = Timestamp::parse("2025-06-01T12:00:00.500000Z").unwrap();
        assert_eq!(ts.to_string_canonical(), "2025-06-01T12:00:00.500000Z");
        assert_eq!(Timestamp::parse(&ts.to_string_canonical()).unwrap(), ts);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Timestamp::parse("not-a-time").is_err());
    }

    #[test]
    fn test_ordering() {
        let a = Timestamp::parse("2025-01-01T00:00:00Z").unwrap();
        let b = Timestamp::parse("2025-01-02T00:00:00Z").unwrap();
        assert!(a < b);
        assert_eq!(a, a);
    }

    #[test]
    fn test_resolve_defaults_to_now() {
        let before = Timestamp::now();
        let resolved = Timestamp::resolve(None);
        assert!(resolved >= before);

        let fixed = Timestamp::parse("2025-01-01T00:00:00Z").unwrap();
        assert_eq!(Timestamp::resolve(Some(fixed)), fixed);
    }

    #[test]
    fn test_add_seconds() {
        let a = Timestamp::parse("2025-01-01T00:00:00Z").unwrap();
        assert_eq!(
            a.add_seconds(90).to_string_canonical(),
            "2025-01-01T00:01:30.000000Z"
        );
        assert!(a.add_seconds(-10) < a);
    }
}
