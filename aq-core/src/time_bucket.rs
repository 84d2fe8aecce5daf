use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use std::fmt;

/// One calendar hour, the time dimension of the warehouse.
///
/// Buckets are keyed by (year, month, day, hour); every timestamp inside the
/// hour maps to the same bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeBucket {
    start: NaiveDateTime,
}

impl TimeBucket {
    /// The bucket containing `timestamp`.
    pub fn from_timestamp(timestamp: &NaiveDateTime) -> TimeBucket {
        let start = timestamp
            .date()
            .and_hms_opt(timestamp.hour(), 0, 0)
            .unwrap_or(*timestamp);
        TimeBucket { start }
    }

    /// First instant of the hour.
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn year(&self) -> i32 {
        self.start.year()
    }

    pub fn month(&self) -> u32 {
        self.start.month()
    }

    pub fn day(&self) -> u32 {
        self.start.day()
    }

    pub fn hour(&self) -> u32 {
        self.start.hour()
    }

    /// Natural key of the bucket.
    pub fn key(&self) -> (i32, u32, u32, u32) {
        (self.year(), self.month(), self.day(), self.hour())
    }

    /// English weekday name, e.g. "Monday".
    pub fn weekday_name(&self) -> String {
        self.start.format("%A").to_string()
    }

    /// English month name, e.g. "March".
    pub fn month_name(&self) -> String {
        self.start.format("%B").to_string()
    }

    /// Calendar quarter, 1 through 4.
    pub fn quarter(&self) -> u32 {
        (self.month() - 1) / 3 + 1
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start.format("%Y-%m-%d %H:00"))
    }
}

#[cfg(test)]
mod tests {
    use super::TimeBucket;
    use chrono::NaiveDate;

    #[test]
    fn timestamps_in_same_hour_share_bucket() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let a = TimeBucket::from_timestamp(&date.and_hms_opt(13, 5, 0).unwrap());
        let b = TimeBucket::from_timestamp(&date.and_hms_opt(13, 59, 59).unwrap());
        let c = TimeBucket::from_timestamp(&date.and_hms_opt(14, 0, 0).unwrap());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.key(), (2024, 3, 4, 13));
        assert_eq!(a.start(), date.and_hms_opt(13, 0, 0).unwrap());
    }

    #[test]
    fn derived_calendar_attributes() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        let bucket = TimeBucket::from_timestamp(&ts);
        assert_eq!(bucket.weekday_name(), "Monday");
        assert_eq!(bucket.month_name(), "March");
        assert_eq!(bucket.quarter(), 1);
        assert_eq!(bucket.to_string(), "2024-03-04 08:00");
    }

    #[test]
    fn quarter_boundaries() {
        let q = |m| {
            let ts = NaiveDate::from_ymd_opt(2023, m, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap();
            TimeBucket::from_timestamp(&ts).quarter()
        };
        assert_eq!(q(1), 1);
        assert_eq!(q(3), 1);
        assert_eq!(q(4), 2);
        assert_eq!(q(9), 3);
        assert_eq!(q(12), 4);
    }
}
