//! Calendar period ranges in Pacific time.
//!
//! YESTERDAY, LAST_WEEK, and LAST_MONTH are fixed calendar periods in
//! Pacific time so public rankings stay comparable; per-park derived
//! stats use each park's own timezone upstream of these queries.

use chrono::{Datelike, Duration, NaiveDate};

use parkpulse_stats::bounds::pacific_today;

/// A closed date range plus a human-readable label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub label: String,
}

/// Yesterday's Pacific calendar date.
#[must_use]
pub fn yesterday_pacific() -> NaiveDate {
    pacific_today() - Duration::days(1)
}

/// The previous complete Sunday-Saturday week in Pacific time.
#[must_use]
pub fn last_week_range() -> PeriodRange {
    last_week_range_from(pacific_today())
}

/// The previous complete calendar month in Pacific time.
#[must_use]
pub fn last_month_range() -> PeriodRange {
    last_month_range_from(pacific_today())
}

/// Sunday-Saturday week strictly before the week containing `today`.
#[must_use]
pub fn last_week_range_from(today: NaiveDate) -> PeriodRange {
    // Days since the most recent Sunday (Sunday itself counts as 0)
    let days_since_sunday = today.weekday().num_days_from_sunday() as i64;
    let this_sunday = today - Duration::days(days_since_sunday);
    let start = this_sunday - Duration::days(7);
    let end = start + Duration::days(6);

    PeriodRange {
        start_date: start,
        end_date: end,
        label: format_week_label(start, end),
    }
}

/// The complete month before the one containing `today`.
#[must_use]
pub fn last_month_range_from(today: NaiveDate) -> PeriodRange {
    let first_of_this_month = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
        .unwrap_or(today);
    let end = first_of_this_month - Duration::days(1);
    let start = NaiveDate::from_ymd_opt(end.year(), end.month(), 1).unwrap_or(end);

    PeriodRange {
        start_date: start,
        end_date: end,
        label: format!("{} {}", month_name(start.month()), start.year()),
    }
}

fn format_week_label(start: NaiveDate, end: NaiveDate) -> String {
    if start.month() == end.month() {
        format!(
            "{} {}-{}, {}",
            month_name(start.month()),
            start.day(),
            end.day(),
            end.year()
        )
    } else {
        format!(
            "{} {} - {} {}, {}",
            month_name(start.month()),
            start.day(),
            month_name(end.month()),
            end.day(),
            end.year()
        )
    }
}

const fn month_name(month: u32) -> &'static str {
    match month {
        1 => "Jan",
        2 => "Feb",
        3 => "Mar",
        4 => "Apr",
        5 => "May",
        6 => "Jun",
        7 => "Jul",
        8 => "Aug",
        9 => "Sep",
        10 => "Oct",
        11 => "Nov",
        _ => "Dec",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_last_week_is_previous_sunday_to_saturday() {
        // 2025-07-30 is a Wednesday; the previous complete week is
        // Sunday 07-20 through Saturday 07-26.
        let range = last_week_range_from(d(2025, 7, 30));
        assert_eq!(range.start_date, d(2025, 7, 20));
        assert_eq!(range.end_date, d(2025, 7, 26));
        assert_eq!(range.start_date.weekday(), Weekday::Sun);
        assert_eq!(range.end_date.weekday(), Weekday::Sat);
    }

    #[test]
    fn test_last_week_from_a_sunday() {
        // On a Sunday the current week has just started; last week ends
        // yesterday.
        let range = last_week_range_from(d(2025, 7, 27));
        assert_eq!(range.start_date, d(2025, 7, 20));
        assert_eq!(range.end_date, d(2025, 7, 26));
    }

    #[test]
    fn test_last_week_label() {
        let range = last_week_range_from(d(2025, 7, 30));
        assert_eq!(range.label, "Jul 20-26, 2025");

        // Month-spanning week
        let range = last_week_range_from(d(2025, 8, 6));
        assert_eq!(range.start_date, d(2025, 7, 27));
        assert_eq!(range.end_date, d(2025, 8, 2));
        assert_eq!(range.label, "Jul 27 - Aug 2, 2025");
    }

    #[test]
    fn test_last_month_simple() {
        let range = last_month_range_from(d(2025, 7, 30));
        assert_eq!(range.start_date, d(2025, 6, 1));
        assert_eq!(range.end_date, d(2025, 6, 30));
        assert_eq!(range.label, "Jun 2025");
    }

    #[test]
    fn test_last_month_january_wraps_year() {
        let range = last_month_range_from(d(2025, 1, 15));
        assert_eq!(range.start_date, d(2024, 12, 1));
        assert_eq!(range.end_date, d(2024, 12, 31));
        assert_eq!(range.label, "Dec 2024");
    }
}
