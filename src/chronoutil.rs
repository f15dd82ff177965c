use chrono::{DateTime, Utc};

/// Parse an `expiration` query parameter value (milliseconds since the Unix epoch).
///
/// Returns `None` if the value is not a decimal integer or falls outside the range chrono can
/// represent.
pub(crate) fn parse_expiration(value: &str) -> Option<DateTime<Utc>> {
    let millis = value.parse::<i64>().ok()?;
    DateTime::<Utc>::from_timestamp_millis(millis)
}

/// Render a timestamp as an `expiration` query parameter value.
#[inline]
pub(crate) fn expiration_millis(expiration: DateTime<Utc>) -> i64 {
    expiration.timestamp_millis()
}
