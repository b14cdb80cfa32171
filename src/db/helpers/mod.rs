use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, Utc};

/// Fixed-width RFC 3339 form (`2024-01-01T09:00:00.000Z`).
///
/// Every stored timestamp uses this layout so that SQLite's text ordering
/// matches chronological ordering for range filters and `ORDER BY`.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Rejects instants whose year falls outside `0000..=9999`; their RFC 3339
/// form is not four-digit and would break text ordering.
pub fn ensure_storable(value: DateTime<Utc>, field: &str) -> Result<DateTime<Utc>> {
    if (0..=9999).contains(&value.year()) {
        Ok(value)
    } else {
        Err(anyhow!("{field} must fall within years 0000-9999"))
    }
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

/// Accepts a full RFC 3339 timestamp or a bare `YYYY-MM-DD` date, which is
/// read as UTC midnight.
pub fn parse_flexible_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    let parsed = match DateTime::parse_from_rfc3339(trimmed) {
        Ok(parsed) => parsed.with_timezone(&Utc),
        Err(_) => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
            .ok_or_else(|| anyhow!("{field} is not a valid ISO date: '{value}'"))?,
    };
    ensure_storable(parsed, field)
}

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formatted_timestamps_sort_chronologically() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let late = early + chrono::Duration::milliseconds(1500);
        assert_eq!(format_timestamp(&early), "2024-01-01T09:00:00.000Z");
        assert!(format_timestamp(&early) < format_timestamp(&late));
    }

    #[test]
    fn flexible_parse_accepts_dates_and_offsets() {
        let midnight = parse_flexible_datetime("2024-01-02", "endDate").unwrap();
        assert_eq!(midnight, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());

        let shifted = parse_flexible_datetime("2024-01-01T10:00:00+01:00", "startDate").unwrap();
        assert_eq!(shifted, Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap());

        assert!(parse_flexible_datetime("yesterday", "startDate").is_err());
    }

    #[test]
    fn five_digit_years_are_not_storable() {
        let last = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap();
        assert!(ensure_storable(last, "timestamp").is_ok());

        let past_end = last + chrono::Duration::seconds(1);
        assert!(ensure_storable(past_end, "timestamp").is_err());
        assert!(parse_flexible_datetime("9999-12-31T23:59:59-01:00", "startDate").is_err());
    }
}
