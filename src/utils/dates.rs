//! Calendar date helpers shared by the ETL and time series code

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

/// Date-only layouts, tried in order
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%y"];

/// Date-time layouts, tried after the date-only ones
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%a %b %e %H:%M:%S %Y"];

fn epoch() -> NaiveDate {
    DateTime::UNIX_EPOCH.date_naive()
}

/// Parse a date written in any of the supported layouts.
///
/// Accepts ISO dates (`2024-03-01`), ISO date-times (`2024-03-01 13:45:00`),
/// US short dates (`03/01/24`) and C locale timestamps (`Fri Mar  1 13:45:00 2024`).
/// Returns `None` when no layout matches.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Days since 1970-01-01, the physical representation of a polars `Date`
pub fn date_to_days(date: NaiveDate) -> i32 {
    date.signed_duration_since(epoch()).num_days() as i32
}

pub fn days_to_date(days: i32) -> NaiveDate {
    epoch() + Duration::days(i64::from(days))
}
