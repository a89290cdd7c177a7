use crate::date::normalize_day;
use crate::event::NotifyTime;
use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;

/// The UTC instant at which `date`'s month/day occurs in `year` at the
/// given local wall-clock time in `tz`. A Feb 29 anniversary resolves to
/// Feb 28 when `year` is not a leap year.
pub fn notify_utc_for_year(date: NaiveDate, tz: Tz, at: NotifyTime, year: i32) -> DateTime<Utc> {
    let day = normalize_day(year, date.month(), date.day());
    let local_date =
        NaiveDate::from_ymd_opt(year, date.month(), day).expect("normalized day is in range");
    resolve_local(tz, local_date.and_time(at.as_naive_time())).with_timezone(&Utc)
}

/// The next UTC instant the event should fire, strictly after `reference`:
/// this year's occurrence if it is still ahead, otherwise next year's.
pub fn next_notify_utc(
    date: NaiveDate,
    tz: Tz,
    at: NotifyTime,
    reference: DateTime<Utc>,
) -> DateTime<Utc> {
    let year = reference.year();
    let candidate = notify_utc_for_year(date, tz, at, year);
    if candidate <= reference {
        notify_utc_for_year(date, tz, at, year + 1)
    } else {
        candidate
    }
}

// A wall-clock inside a spring-forward gap does not exist; one inside a
// fall-back fold exists twice. Gap: first valid instant after the gap.
// Fold: the earlier pass.
fn resolve_local(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(instant) => instant,
        LocalResult::Ambiguous(first, _) => first,
        LocalResult::None => {
            let mut probe = naive;
            loop {
                probe = probe + Duration::minutes(1);
                match tz.from_local_datetime(&probe) {
                    LocalResult::Single(instant) => break instant,
                    LocalResult::Ambiguous(first, _) => break first,
                    LocalResult::None => continue,
                }
            }
        }
    }
}

/// The persisted form of instants: ISO-8601 UTC with millisecond precision.
pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_instant(s: &str) -> chrono::ParseResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).map(|instant| instant.with_timezone(&Utc))
}
