//! Timestamp utilities
//!
//! All timestamps are stored as fixed-width RFC 3339 UTC text
//! (`2026-08-07T12:34:56.123456Z`). Fixed-width formatting keeps
//! lexicographic ordering identical to chronological ordering, which the
//! correlation window queries rely on.

use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for storage
pub fn to_db(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp
pub fn from_db(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidInput(format!("Bad timestamp '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_roundtrip() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 7, 12, 34, 56).unwrap();
        let stored = to_db(ts);
        assert_eq!(from_db(&stored).unwrap(), ts);
    }

    #[test]
    fn test_lexicographic_order_matches_chronological() {
        let early = Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap();
        let late = early + chrono::Duration::milliseconds(1);
        assert!(to_db(early) < to_db(late));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(from_db("not a timestamp").is_err());
    }
}
