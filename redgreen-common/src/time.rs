//! Timestamp utilities

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// True once `now` is strictly past `start + period`
pub fn has_expired(start: DateTime<Utc>, period: Duration, now: DateTime<Utc>) -> bool {
    now > start + period
}

/// ISO 8601 rendering used in API responses (`2025-01-31T12:00:00.000000`)
pub fn iso_utc(ts: DateTime<Utc>) -> String {
    ts.naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// RFC 3339 rendering used in log lines
pub fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Seconds between two timestamps as a float
pub fn elapsed_secs(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}
