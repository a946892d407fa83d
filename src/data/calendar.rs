//! Calendar Helpers
//! Fixed calendar dates and ISO year-week keys used as time axes.

use chrono::{Datelike, NaiveDate, Weekday};
use thiserror::Error;

/// Day number (from the common era) of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("invalid year-week '{0}', expected YYYY-WW or YYYY-Www")]
    InvalidYearWeek(String),
}

/// Parse a fixed calendar date (`YYYY-MM-DD`).
pub fn parse_date(raw: &str) -> Result<NaiveDate, CalendarError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| CalendarError::InvalidDate(raw.to_string()))
}

/// Parse an ISO year-week key (`2021-05` or `2021-W05`) into the Monday
/// of that week.
pub fn parse_year_week(raw: &str) -> Result<NaiveDate, CalendarError> {
    let invalid = || CalendarError::InvalidYearWeek(raw.to_string());
    let trimmed = raw.trim();

    let (year, week) = trimmed.split_once('-').ok_or_else(invalid)?;
    let week = week.strip_prefix('W').unwrap_or(week);

    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if week.is_empty() || week.len() > 2 || !week.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let year: i32 = year.parse().map_err(|_| invalid())?;
    let week: u32 = week.parse().map_err(|_| invalid())?;

    NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).ok_or_else(invalid)
}

/// Parse a time key that is either a fixed date or a year-week.
pub fn parse_time_key(raw: &str) -> Result<NaiveDate, CalendarError> {
    parse_date(raw).or_else(|_| parse_year_week(raw))
}

/// Format a date as its ISO `YYYY-WW` key. Inverse of [`parse_year_week`]
/// for Mondays.
pub fn format_year_week(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-{:02}", week.year(), week.week())
}

/// Days since 1970-01-01, the physical representation of a polars `Date`.
pub fn days_since_epoch(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub fn from_days_since_epoch(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}
