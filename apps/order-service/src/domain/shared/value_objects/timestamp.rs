//! Timestamp value object for temporal data.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A UTC instant with millisecond precision.
///
/// Crosses every boundary as an RFC 3339 string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a new Timestamp from a `DateTime<Utc>`, truncated to milliseconds.
    #[must_use]
    pub fn new(dt: DateTime<Utc>) -> Self {
        Self(dt.trunc_subsecs(3))
    }

    /// Get the current timestamp.
    #[must_use]
    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    /// Create a timestamp from Unix milliseconds.
    #[must_use]
    pub fn from_unix_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(Self)
    }

    /// Parse from an RFC 3339 string.
    ///
    /// # Errors
    ///
    /// Returns error if the string is not a valid RFC 3339 timestamp.
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        let dt = DateTime::parse_from_rfc3339(s)?;
        Ok(Self::new(dt.with_timezone(&Utc)))
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub const fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Format as RFC 3339 with millisecond precision and a `Z` suffix.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }

    /// Get the Unix timestamp in milliseconds.
    #[must_use]
    pub fn unix_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Add a number of seconds.
    #[must_use]
    pub fn plus_seconds(&self, seconds: i64) -> Self {
        Self(self.0 + Duration::seconds(seconds))
    }

    /// Milliseconds elapsed since `earlier` (negative if `earlier` is later).
    #[must_use]
    pub fn millis_since(&self, earlier: &Self) -> i64 {
        (self.0 - earlier.0).num_milliseconds()
    }

    /// The later of `self` and `other`.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        if other.0 > self.0 { other } else { self }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::new(dt)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_truncates_to_millis() {
        let dt = Utc
            .timestamp_opt(1_700_000_000, 123_456_789)
            .single()
            .unwrap();
        let ts = Timestamp::new(dt);
        assert_eq!(ts.as_datetime().timestamp_subsec_nanos(), 123_000_000);
    }

    #[test]
    fn timestamp_rfc3339_format() {
        let ts = Timestamp::parse("2026-01-15T14:30:00.250Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-01-15T14:30:00.250Z");
    }

    #[test]
    fn timestamp_parse_normalizes_offset() {
        let ts = Timestamp::parse("2026-01-15T09:30:00-05:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-01-15T14:30:00.000Z");
    }

    #[test]
    fn timestamp_plus_seconds() {
        let ts = Timestamp::parse("2026-01-15T00:00:00Z").unwrap();
        let later = ts.plus_seconds(86_400);
        assert_eq!(later.millis_since(&ts), 86_400_000);
    }

    #[test]
    fn timestamp_serde_uses_rfc3339_string() {
        let ts = Timestamp::parse("2026-01-15T14:30:00.001Z").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2026-01-15T14:30:00.001Z\"");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn timestamp_max_is_monotone() {
        let a = Timestamp::parse("2026-01-15T00:00:00Z").unwrap();
        let b = a.plus_seconds(1);
        assert_eq!(a.max(b), b);
        assert_eq!(b.max(a), b);
    }
}
