//! # Selectable Date Range
//!
//! The date picker is bounded by a window that either covers the whole APOD
//! archive or only the current year. The window is advisory: a date outside
//! it is still fetched if it reaches the controller.

use chrono::{Datelike, NaiveDate};

/// June 16, 1995: the first day with an Astronomy Picture of the Day.
pub const LAUNCH_DATE: NaiveDate = match NaiveDate::from_ymd_opt(1995, 6, 16) {
    Some(date) => date,
    None => panic!("launch date is a valid calendar date"),
};

/// Bounds handed to the date picker. Derived on demand, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub min: NaiveDate,
    pub max: NaiveDate,
}

impl DateWindow {
    /// Builds the window for the current "limit range" setting.
    pub fn for_session(limit_to_current_year: bool, today: NaiveDate) -> Self {
        Self {
            min: minimum_selectable_date(limit_to_current_year, today),
            max: maximum_selectable_date(today),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.min <= date && date <= self.max
    }
}

/// Earliest selectable date: January 1 of `today`'s year when limited,
/// otherwise the APOD launch date.
pub fn minimum_selectable_date(limit_to_current_year: bool, today: NaiveDate) -> NaiveDate {
    if limit_to_current_year {
        today.with_ordinal(1).unwrap_or(today)
    } else {
        LAUNCH_DATE
    }
}

/// Latest selectable date. There is never a picture for tomorrow.
pub fn maximum_selectable_date(today: NaiveDate) -> NaiveDate {
    today
}
