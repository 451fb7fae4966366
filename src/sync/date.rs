//! Fixed textual date format used inside envelopes and audit messages
//!
//! `yyyy-MM-ddTHH:mm:ss.SSS+hhmm`, millisecond precision. `None` is written
//! as an explicit `null`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

use crate::error::CodecError;

pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

pub fn format(date: &DateTime<Utc>) -> String {
    date.format(FORMAT).to_string()
}

pub fn parse(text: &str) -> Result<DateTime<Utc>, CodecError> {
    DateTime::parse_from_str(text, FORMAT)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| CodecError::InvalidDate(text.to_string()))
}

/// `#[serde(with = "crate::sync::date::optional")]`
pub mod optional {
    use super::*;

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(date) => serializer.serialize_str(&super::format(date)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|text| super::parse(&text).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// `#[serde(with = "crate::sync::date::required")]`
pub mod required {
    use super::*;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format(date))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        super::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_shape() {
        let date = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap()
            + chrono::Duration::milliseconds(45);
        assert_eq!(format(&date), "2024-03-07T09:05:02.045+0000");
    }

    #[test]
    fn test_parse_returns_same_instant() {
        let date = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap()
            + chrono::Duration::milliseconds(999);
        assert_eq!(parse(&format(&date)).unwrap(), date);
    }

    #[test]
    fn test_parse_honours_offset() {
        let parsed = parse("2024-01-01T02:00:00.000+0200").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse("yesterday"), Err(CodecError::InvalidDate(_))));
    }
}
