//! Lenient date parsing and hour rounding shared by the planner stages.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Date-time layouts accepted after the plain `YYYY-MM-DD` form.
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse a calendar date from an ISO date, ISO date-time, or RFC 3339 string.
///
/// Returns `None` for anything else; callers treat that as "no date".
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
}

/// Round hours to 2 decimals, half-up with a small bias against float floor artifacts.
pub fn round_hours(hours: f64) -> f64 {
    ((hours + 1e-9) * 100.0).round() / 100.0
}
