//! Timestamp parsing for upstream payloads and manual spreadsheets.
//!
//! Upstream exports are inconsistent: most rows carry an ISO-like date-time
//! string, but some arrive as spreadsheet serial numbers (days since the
//! 1899-12-30 origin, possibly with a decimal comma). [`parse_timestamp`]
//! tries the textual formats first and falls back to the serial convention.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};

/// Date-time layouts accepted for textual timestamps, tried in order.
pub const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Date-only layouts; these map to midnight.
pub const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

/// Format used in the upstream `$gte` filter.
pub const API_FILTER_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Largest serial day accepted (9999-12-31).
const MAX_SERIAL_DAYS: f64 = 2_958_465.0;

/// Origin of the spreadsheet serial-date convention.
pub fn spreadsheet_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("1899-12-30 is a valid date")
}

/// Parse a textual date-time. Offsets are dropped and the wall-clock time
/// of the source is kept.
pub fn parse_datetime_text(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, format) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Interpret `raw` as a day count from the spreadsheet epoch, with an
/// optional fractional part for the time of day. Decimal commas are
/// accepted. The result is rounded to the nearest second.
pub fn parse_spreadsheet_serial(raw: &str) -> Option<NaiveDateTime> {
    let days: f64 = raw.trim().replace(',', ".").parse().ok()?;
    if !days.is_finite() || !(0.0..=MAX_SERIAL_DAYS).contains(&days) {
        return None;
    }
    let seconds = (days * 86_400.0).round() as i64;
    spreadsheet_epoch().checked_add_signed(TimeDelta::try_seconds(seconds)?)
}

/// Parse a timestamp cell: textual formats first, then the serial-date
/// fallback. Returns `None` when neither applies.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    parse_datetime_text(raw).or_else(|| parse_spreadsheet_serial(raw))
}
