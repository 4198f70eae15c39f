//! Date normalization for sidecar metadata.
//!
//! Sources report published dates in whatever format their platform uses.
//! The sink expects one canonical representation: ISO 8601 date (YYYY-MM-DD).

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Normalize a date string to canonical `YYYY-MM-DD`.
///
/// Accepted inputs:
/// - ISO 8601 datetime: `2025-08-21T05:00:00+00:00`
/// - ISO 8601 date: `2025-08-21`
/// - Compact: `20250821`
/// - RFC 822 (RSS pubDate): `Thu, 21 Aug 2025 05:00:00 -0000`
pub fn to_iso_date(input: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        bail!("empty date string");
    }

    // Already canonical
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date.format("%Y-%m-%d").to_string());
    }

    // ISO datetime, with or without offset
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.date_naive().format("%Y-%m-%d").to_string());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt.date().format("%Y-%m-%d").to_string());
    }

    // Compact YYYYMMDD (YouTube upload_date)
    if input.len() == 8 && input.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(date) = NaiveDate::parse_from_str(input, "%Y%m%d") {
            return Ok(date.format("%Y-%m-%d").to_string());
        }
    }

    // RFC 822 variants seen in feeds
    if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
        return Ok(dt.date_naive().format("%Y-%m-%d").to_string());
    }
    for fmt in ["%a, %d %b %Y %H:%M:%S", "%d %b %Y %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, fmt) {
            return Ok(dt.date().format("%Y-%m-%d").to_string());
        }
    }

    bail!("unrecognized date format: {input}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_supported_formats_normalize_identically() {
        for input in [
            "2025-08-21T05:00:00+00:00",
            "2025-08-21",
            "20250821",
            "Thu, 21 Aug 2025 05:00:00 -0000",
        ] {
            assert_eq!(to_iso_date(input).unwrap(), "2025-08-21", "input: {input}");
        }
    }

    #[test]
    fn test_rfc822_without_timezone() {
        assert_eq!(
            to_iso_date("Thu, 21 Aug 2025 05:00:00").unwrap(),
            "2025-08-21"
        );
        assert_eq!(to_iso_date("21 Aug 2025 05:00:00").unwrap(), "2025-08-21");
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        assert_eq!(to_iso_date("  2025-08-21  ").unwrap(), "2025-08-21");
    }

    #[test]
    fn test_unrecognized_input_is_an_error() {
        assert!(to_iso_date("").is_err());
        assert!(to_iso_date("yesterday").is_err());
        assert!(to_iso_date("2025/08/21").is_err());
        // Not a real calendar date
        assert!(to_iso_date("20251341").is_err());
    }
}
