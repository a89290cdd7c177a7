use chrono::{Datelike, NaiveDate};
use thiserror::Error;

// Anniversaries this far from the present are assumed to be typos.
const MIN_EVENT_YEAR: i32 = 1900;
const MAX_EVENT_YEAR: i32 = 2200;

#[derive(Error, Debug)]
#[error("date: {0} is not a valid YYYY-MM-DD date")]
pub struct InvalidDateError(pub String);

/// Parse a `YYYY-MM-DD` anniversary date. The calendar does the validation:
/// anything `chrono` cannot place on it (Feb 30, month 13, malformed input)
/// is rejected, as are years outside the service's plausible range.
pub fn parse_event_date(datestr: &str) -> Result<NaiveDate, InvalidDateError> {
    let date = NaiveDate::parse_from_str(datestr, "%Y-%m-%d")
        .map_err(|_| InvalidDateError(datestr.to_string()))?;
    if !(MIN_EVENT_YEAR..=MAX_EVENT_YEAR).contains(&date.year()) {
        return Err(InvalidDateError(datestr.to_string()));
    }
    Ok(date)
}

/// Clamp a day-of-month into `year`/`month`, so that a Feb 29 anniversary
/// resolves to Feb 28 in non-leap years.
pub fn normalize_day(year: i32, month: u32, day: u32) -> u32 {
    if NaiveDate::from_ymd_opt(year, month, day).is_some() {
        day
    } else {
        day.min(last_day_of_month(year, month))
    }
}

/// Length of a month, read off the calendar as the day before the first of
/// the following month.
pub fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .map(|last| last.day())
        .expect("month is in 1..=12")
}
