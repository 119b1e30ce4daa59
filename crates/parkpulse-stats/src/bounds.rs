//! Timezone-correct period boundaries.
//!
//! Raw timestamps are UTC; day and week boundaries are derived by
//! converting through the park's IANA timezone. DST gaps and folds resolve
//! to the earliest valid instant.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

/// Parse an IANA timezone name, falling back to UTC.
#[must_use]
pub fn parse_tz(name: &str) -> Tz {
    name.parse::<Tz>().unwrap_or(chrono_tz::UTC)
}

/// UTC bounds of one local calendar day: `[00:00 local, next 00:00 local)`.
#[must_use]
pub fn local_day_bounds_utc(date: NaiveDate, tz_name: &str) -> (DateTime<Utc>, DateTime<Utc>) {
    let tz = parse_tz(tz_name);
    (local_midnight_utc(date, tz), local_midnight_utc(next_day(date), tz))
}

/// The UTC instant of local midnight on a date.
///
/// Around DST transitions midnight can be skipped or doubled; the earliest
/// valid instant is used.
#[must_use]
pub fn local_midnight_utc(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(chrono::NaiveTime::MIN);
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
            dt.with_timezone(&Utc)
        }
        chrono::LocalResult::None => {
            // Midnight fell in a DST gap; take the first valid instant after
            let later = naive + chrono::Duration::hours(1);
            match tz.from_local_datetime(&later) {
                chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
                    dt.with_timezone(&Utc)
                }
                chrono::LocalResult::None => Utc.from_utc_datetime(&naive),
            }
        }
    }
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}

/// Pacific timezone used for the public calendar periods.
pub const PACIFIC: Tz = chrono_tz::America::Los_Angeles;

/// Current instant in Pacific time.
#[must_use]
pub fn pacific_now() -> DateTime<Tz> {
    Utc::now().with_timezone(&PACIFIC)
}

/// Today's date in Pacific time.
#[must_use]
pub fn pacific_today() -> NaiveDate {
    pacific_now().date_naive()
}

/// UTC bounds of one Pacific calendar day.
#[must_use]
pub fn pacific_day_bounds_utc(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        local_midnight_utc(date, PACIFIC),
        local_midnight_utc(date.succ_opt().unwrap_or(date), PACIFIC),
    )
}

/// ISO week identification for a date: (ISO year, week number, Monday).
#[must_use]
pub fn iso_week_of(date: NaiveDate) -> (i32, u32, NaiveDate) {
    let week = date.iso_week();
    let monday = NaiveDate::from_isoywd_opt(week.year(), week.week(), Weekday::Mon)
        .unwrap_or(date);
    (week.year(), week.week(), monday)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_eastern_day_bounds() {
        // EST is UTC-5 in January
        let (start, end) = local_day_bounds_utc(d(2025, 1, 15), "America/New_York");
        assert_eq!(start.to_rfc3339(), "2025-01-15T05:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2025-01-16T05:00:00+00:00");
    }

    #[test]
    fn test_pacific_day_bounds_summer() {
        // PDT is UTC-7 in July
        let (start, end) = local_day_bounds_utc(d(2025, 7, 4), "America/Los_Angeles");
        assert_eq!(start.to_rfc3339(), "2025-07-04T07:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2025-07-05T07:00:00+00:00");
    }

    #[test]
    fn test_spring_forward_day_is_23_hours() {
        // US DST starts 2025-03-09; the local day loses an hour
        let (start, end) = local_day_bounds_utc(d(2025, 3, 9), "America/Los_Angeles");
        let hours = (end - start).num_hours();
        assert_eq!(hours, 23);
    }

    #[test]
    fn test_fall_back_day_is_25_hours() {
        // US DST ends 2025-11-02
        let (start, end) = local_day_bounds_utc(d(2025, 11, 2), "America/Los_Angeles");
        assert_eq!((end - start).num_hours(), 25);
    }

    #[test]
    fn test_unknown_timezone_falls_back_to_utc() {
        let (start, end) = local_day_bounds_utc(d(2025, 5, 1), "Not/AZone");
        assert_eq!(start.to_rfc3339(), "2025-05-01T00:00:00+00:00");
        assert_eq!((end - start).num_hours(), 24);
    }

    #[test]
    fn test_iso_week_monday() {
        // 2024-12-30 is a Monday in ISO week 1 of 2025
        let (year, week, monday) = iso_week_of(d(2024, 12, 30));
        assert_eq!(year, 2025);
        assert_eq!(week, 1);
        assert_eq!(monday, d(2024, 12, 30));

        // Any day of the same week maps to the same Monday
        let (y2, w2, m2) = iso_week_of(d(2025, 1, 3));
        assert_eq!((y2, w2, m2), (2025, 1, d(2024, 12, 30)));
    }

    #[test]
    fn test_iso_week_53() {
        // 2026 begins inside ISO week 53 of 2026? No - 2026-01-01 is
        // Thursday, ISO week 1. Use 2027-01-01 (Friday) -> week 53 of 2026.
        let (year, week, _) = iso_week_of(d(2027, 1, 1));
        assert_eq!(year, 2026);
        assert_eq!(week, 53);
    }
}
