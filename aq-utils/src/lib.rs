//! Shared utility functions for AQ crates.

/// Date utility functions
pub mod dates {
    use anyhow::{bail, Context};
    use chrono::{NaiveDate, NaiveDateTime};
    use serde::Serialize;

    /// How timestamps are stored in the warehouse.
    pub const STORED_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    /// Format a NaiveDate as "YYYY-MM-DD"
    pub fn format_date(date: &NaiveDate) -> String {
        date.format("%Y-%m-%d").to_string()
    }

    /// Format a timestamp the way the warehouse stores it.
    pub fn format_timestamp(ts: &NaiveDateTime) -> String {
        ts.format(STORED_TIMESTAMP_FORMAT).to_string()
    }

    /// Parse a timestamp read back from the warehouse.
    pub fn parse_stored_timestamp(s: &str) -> anyhow::Result<NaiveDateTime> {
        NaiveDateTime::parse_from_str(s, STORED_TIMESTAMP_FORMAT)
            .with_context(|| format!("Invalid stored timestamp {:?}", s))
    }

    /// Parse a date argument in "YYYY-MM-DD" or compact "YYYYMMDD" format
    pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
        let s = s.trim();
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
            .with_context(|| format!("Invalid date {:?}, expected YYYY-MM-DD", s))
    }

    /// Inclusive range of calendar days. A missing bound is open.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
    pub struct DateRange {
        pub start: Option<NaiveDate>,
        pub end: Option<NaiveDate>,
    }

    impl DateRange {
        pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> anyhow::Result<DateRange> {
            if let (Some(start), Some(end)) = (start, end) {
                if end < start {
                    bail!("Date range ends ({}) before it starts ({})", end, start);
                }
            }
            Ok(DateRange { start, end })
        }

        pub fn contains(&self, date: &NaiveDate) -> bool {
            self.start.map_or(true, |s| s <= *date) && self.end.map_or(true, |e| *date <= e)
        }

        /// Bounds formatted as "YYYY-MM-DD" for SQL parameters.
        pub fn bounds(&self) -> (Option<String>, Option<String>) {
            (
                self.start.as_ref().map(format_date),
                self.end.as_ref().map(format_date),
            )
        }
    }

    /// Build an optional range from optional start/end arguments.
    pub fn date_range(start: Option<&str>, end: Option<&str>) -> anyhow::Result<Option<DateRange>> {
        if start.is_none() && end.is_none() {
            return Ok(None);
        }
        let start = start.map(parse_date).transpose()?;
        let end = end.map(parse_date).transpose()?;
        DateRange::new(start, end).map(Some)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_date_formats() {
            let expected = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
            assert_eq!(parse_date("2024-02-29").unwrap(), expected);
            assert_eq!(parse_date("20240229").unwrap(), expected);
            assert!(parse_date("2023-02-29").is_err());
        }

        #[test]
        fn test_timestamp_round_trip() {
            let ts = NaiveDate::from_ymd_opt(2023, 6, 15)
                .unwrap()
                .and_hms_opt(7, 0, 0)
                .unwrap();
            let stored = format_timestamp(&ts);
            assert_eq!(stored, "2023-06-15 07:00:00");
            assert_eq!(parse_stored_timestamp(&stored).unwrap(), ts);
            assert_eq!(format_date(&ts.date()), "2023-06-15");
        }

        #[test]
        fn test_date_range_bounds() {
            assert_eq!(date_range(None, None).unwrap(), None);

            let range = date_range(Some("2024-01-01"), None).unwrap().unwrap();
            assert_eq!(range.end, None);
            assert!(range.contains(&NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()));
            assert!(!range.contains(&NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()));
            assert_eq!(range.bounds(), (Some("2024-01-01".to_string()), None));

            assert!(date_range(Some("2024-02-01"), Some("2024-01-01")).is_err());
        }
    }
}
