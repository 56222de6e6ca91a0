//! # Daily Fetch Counter
//!
//! Counts the pictures fetched during the current calendar day. The count is
//! only carried over from the previous run when that run happened today;
//! any other stored date, or none at all, starts the day at zero.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Formats accepted for a stored "last run" date, tried in order.
///
/// The first is what this crate writes; the others cover timestamps and the
/// `M/D/YYYY h:mm:ss AM` shape written by older Windows builds.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &["%m/%d/%Y %I:%M:%S %p", "%m/%d/%Y %H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Returns the stored count if `last_run_date` is `today`, otherwise 0.
///
/// Unparseable dates and counts are treated as absent.
pub fn load(last_run_date: Option<&str>, count: Option<&str>, today: NaiveDate) -> u32 {
    let ran_today = last_run_date
        .and_then(parse_stored_date)
        .map(|date| date == today)
        .unwrap_or(false);

    if !ran_today {
        return 0;
    }

    count
        .and_then(|value| value.trim().parse::<u32>().ok())
        .unwrap_or(0)
}

/// Bumps the count for one more fetched picture.
pub fn increment(current: u32) -> u32 {
    current.saturating_add(1)
}

/// Parses a stored date, dropping any time-of-day component.
pub fn parse_stored_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Formats a date the way it is written back to the settings store.
pub fn format_stored_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn test_keeps_count_from_earlier_today() {
        assert_eq!(load(Some("2024-06-15"), Some("7"), today()), 7);
    }

    #[test]
    fn test_rolls_over_on_a_new_day() {
        assert_eq!(load(Some("2024-06-14"), Some("7"), today()), 0);
        assert_eq!(load(Some("2023-06-15"), Some("7"), today()), 0);
    }

    #[test]
    fn test_no_stored_date_means_zero() {
        assert_eq!(load(None, Some("7"), today()), 0);
        assert_eq!(load(None, None, today()), 0);
    }

    #[test]
    fn test_corrupt_values_fall_back_to_zero() {
        assert_eq!(load(Some("yesterday-ish"), Some("7"), today()), 0);
        assert_eq!(load(Some("2024-06-15"), Some("seven"), today()), 0);
        assert_eq!(load(Some("2024-06-15"), Some("-3"), today()), 0);
        assert_eq!(load(Some("2024-06-15"), None, today()), 0);
    }

    #[test]
    fn test_time_of_day_is_ignored() {
        assert_eq!(load(Some("2024-06-15T23:59:00+00:00"), Some("2"), today()), 2);
        assert_eq!(load(Some("6/15/2024 12:00:00 AM"), Some("4"), today()), 4);
        assert_eq!(load(Some("6/15/2024"), Some("5"), today()), 5);
    }

    #[test]
    fn test_increment() {
        assert_eq!(increment(0), 1);
        assert_eq!(increment(41), 42);
        assert_eq!(increment(u32::MAX), u32::MAX);
    }

    #[test]
    fn test_stored_date_round_trips() {
        let written = format_stored_date(today());
        assert_eq!(written, "2024-06-15");
        assert_eq!(parse_stored_date(&written), Some(today()));
    }
}
