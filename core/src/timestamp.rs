//! Serde helper for ISO-8601 UTC timestamps with millisecond precision.
//!
//! Serializes as `2025-01-01T00:00:00.000Z`; deserializes any RFC 3339 instant.
//!
//! ```
//! use chrono::{DateTime, Utc};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Row {
//!     #[serde(with = "loginapp_core::timestamp")]
//!     created_at: DateTime<Utc>,
//! }
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Render `value` the way it appears on the wire.
#[must_use]
pub fn format(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serialize with millisecond precision and a `Z` suffix.
///
/// # Errors
///
/// Propagates serializer errors.
pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(value))
}

/// Deserialize any RFC 3339 instant into UTC.
///
/// # Errors
///
/// Returns a deserializer error if the string is not RFC 3339.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_with_millis_and_z() {
        let at = Utc
            .timestamp_millis_opt(1_735_689_600_123)
            .single()
            .expect("valid millis");
        assert_eq!(format(&at), "2025-01-01T00:00:00.123Z");
    }
}
