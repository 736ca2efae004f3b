use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::ValidationError;

/// RFC3339 timestamp guaranteed to be UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Parse an RFC3339 timestamp; any offset is normalized to UTC.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        OffsetDateTime::parse(input, &Rfc3339)
            .map(|parsed| Self(parsed.to_offset(UtcOffset::UTC)))
            .map_err(|_| ValidationError::TimestampUnparseable {
                value: input.to_owned(),
            })
    }

    /// Lenient parse for inbound observation rows.
    ///
    /// Accepts RFC3339 with any offset, or a naive `YYYY-MM-DD[T ]HH:MM:SS`
    /// which is assumed UTC. Anything else yields `None`; the validator
    /// substitutes the batch timestamp in that case.
    pub fn parse_lenient(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if let Ok(parsed) = OffsetDateTime::parse(trimmed, &Rfc3339) {
            return Some(Self(parsed.to_offset(UtcOffset::UTC)));
        }

        let naive_t = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
        let naive_space = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
        PrimitiveDateTime::parse(trimmed, &naive_t)
            .or_else(|_| PrimitiveDateTime::parse(trimmed, &naive_space))
            .ok()
            .map(|parsed| Self(parsed.assume_utc()))
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    pub fn format_rfc3339(self) -> String {
        self.0
            .format(&Rfc3339)
            .expect("UtcDateTime must be RFC3339 formattable")
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl Serialize for UtcDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_rfc3339())
    }
}

impl<'de> Deserialize<'de> for UtcDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_utc_timestamp() {
        let parsed = UtcDateTime::parse("2024-01-01T00:00:00Z").expect("must parse");
        assert_eq!(parsed.format_rfc3339(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn normalizes_offset_to_utc() {
        let parsed = UtcDateTime::parse("2024-01-01T01:00:00+01:00").expect("must parse");
        assert_eq!(parsed.format_rfc3339(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn lenient_parse_accepts_naive_timestamps() {
        let parsed = UtcDateTime::parse_lenient("2024-06-15T09:30:00").expect("must parse");
        assert_eq!(parsed.format_rfc3339(), "2024-06-15T09:30:00Z");

        let spaced = UtcDateTime::parse_lenient("2024-06-15 09:30:00").expect("must parse");
        assert_eq!(spaced, parsed);
    }

    #[test]
    fn lenient_parse_rejects_garbage() {
        assert!(UtcDateTime::parse_lenient("yesterday-ish").is_none());
    }
}
