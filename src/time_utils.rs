// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for timestamp formatting and lenient parsing.
//!
//! The store keeps all timestamps as RFC3339 strings. Values written by
//! older clients may be malformed, so parsing never errors; callers decide
//! what a missing timestamp means (usually "expired" or "never synced").

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an RFC3339 timestamp, tolerating the offset styles PostgREST emits.
/// Returns `None` for anything unparsable.
pub fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_uses_z_suffix() {
        let date = Utc.with_ymd_and_hms(2024, 3, 10, 2, 0, 0).unwrap();
        assert_eq!(format_utc_rfc3339(date), "2024-03-10T02:00:00Z");
    }

    #[test]
    fn test_parse_accepts_offset_and_z_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 10, 2, 0, 0).unwrap();
        assert_eq!(parse_rfc3339("2024-03-10T02:00:00Z"), Some(expected));
        assert_eq!(parse_rfc3339("2024-03-10T02:00:00+00:00"), Some(expected));
        assert_eq!(parse_rfc3339("2024-03-09T21:00:00-05:00"), Some(expected));
        assert_eq!(
            parse_rfc3339("2024-03-10T02:00:00.000000+00:00"),
            Some(expected)
        );
    }

    #[test]
    fn test_parse_returns_none_for_garbage() {
        assert_eq!(parse_rfc3339(""), None);
        assert_eq!(parse_rfc3339("not-a-timestamp"), None);
        assert_eq!(parse_rfc3339("2024-03-10"), None);
    }
}
