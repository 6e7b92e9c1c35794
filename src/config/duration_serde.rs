//! Common serde utilities for human-readable durations and sizes across configuration.

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::{fmt, time::Duration};

/// Custom serde functions for Duration that support human-readable strings
pub mod duration {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration_str = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&duration_str)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DurationVisitor;

        impl Visitor<'_> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str(
                    "a duration as seconds (number) or human-readable string (e.g., '30s', '5m')",
                )
            }

            fn visit_u64<E>(self, seconds: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Duration::from_secs(seconds))
            }

            fn visit_i64<E>(self, seconds: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                u64::try_from(seconds)
                    .map(Duration::from_secs)
                    .map_err(|_| de::Error::custom(format!("Negative duration: {seconds}")))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                humantime::parse_duration(value)
                    .map_err(|e| de::Error::custom(format!("Invalid duration '{value}': {e}")))
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}

/// Custom serde functions for byte sizes written as `"25MB"`, `"512KB"` or plain numbers
pub mod byte_size {
    use super::*;
    use crate::utils::human_format::{format_bytes, parse_bytes};

    pub fn serialize<S>(bytes: &usize, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_bytes(*bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<usize, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ByteSizeVisitor;

        impl Visitor<'_> for ByteSizeVisitor {
            type Value = usize;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a size in bytes (number) or a string such as '25MB'")
            }

            fn visit_u64<E>(self, bytes: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                usize::try_from(bytes)
                    .map_err(|_| de::Error::custom(format!("Size {bytes} is too large")))
            }

            fn visit_i64<E>(self, bytes: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                usize::try_from(bytes)
                    .map_err(|_| de::Error::custom(format!("Invalid size: {bytes}")))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                parse_bytes(value).ok_or_else(|| de::Error::custom(format!("Invalid size '{value}'")))
            }
        }

        deserializer.deserialize_any(ByteSizeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Serialize, Deserialize)]
    struct Sample {
        #[serde(with = "super::duration")]
        timeout: Duration,
        #[serde(with = "super::byte_size")]
        limit: usize,
    }

    #[test]
    fn test_human_readable_values_parse() {
        let sample: Sample = toml::from_str("timeout = \"1m30s\"\nlimit = \"2MB\"").unwrap();
        assert_eq!(sample.timeout, Duration::from_secs(90));
        assert_eq!(sample.limit, 2 * 1024 * 1024);
    }

    #[test]
    fn test_numeric_values_parse() {
        let sample: Sample = toml::from_str("timeout = 15\nlimit = 4096").unwrap();
        assert_eq!(sample.timeout, Duration::from_secs(15));
        assert_eq!(sample.limit, 4096);
    }

    #[test]
    fn test_invalid_duration_rejected() {
        let result: Result<Sample, _> = toml::from_str("timeout = \"soon\"\nlimit = 1");
        assert!(result.is_err());
    }
}
