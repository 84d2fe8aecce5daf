use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A single pollutant concentration at one station and instant.
///
/// Readings are transient pipeline values: the reshape stage produces them,
/// the imputation stage fills some of their gaps and the loader persists them
/// as measurement facts. `value` is `None` for a slot that is known to exist
/// but has no usable observation; it is never NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub station: String,
    pub timestamp: NaiveDateTime,
    /// Pollutant code without its unit, e.g. "PM2.5".
    pub pollutant: String,
    /// Unit split off the source label, e.g. "ug/m3".
    pub unit: Option<String>,
    pub value: Option<f64>,
    /// True when `value` was filled by interpolation.
    pub imputed: bool,
}

impl Reading {
    /// Build an observed reading. Non-finite values are stored as missing.
    pub fn observed(
        station: &str,
        timestamp: NaiveDateTime,
        pollutant: &str,
        unit: Option<&str>,
        value: f64,
    ) -> Reading {
        Reading {
            station: station.to_string(),
            timestamp,
            pollutant: pollutant.to_string(),
            unit: unit.map(String::from),
            value: Some(value).filter(|v| v.is_finite()),
            imputed: false,
        }
    }

    /// Build a placeholder for a slot with no observation.
    pub fn missing(
        station: &str,
        timestamp: NaiveDateTime,
        pollutant: &str,
        unit: Option<&str>,
    ) -> Reading {
        Reading {
            station: station.to_string(),
            timestamp,
            pollutant: pollutant.to_string(),
            unit: unit.map(String::from),
            value: None,
            imputed: false,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.value.is_none()
    }

    /// Calendar year of the reading.
    pub fn year(&self) -> i32 {
        self.timestamp.year()
    }

    /// The (station, pollutant) pair a reading's time series is keyed on.
    pub fn series_key(&self) -> (String, String) {
        (self.station.clone(), self.pollutant.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::Reading;
    use chrono::NaiveDate;

    fn at(hour: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn observed_reading_keeps_value() {
        let r = Reading::observed("Pance", at(5), "PM2.5", Some("ug/m3"), 18.4);
        assert_eq!(r.value, Some(18.4));
        assert_eq!(r.unit.as_deref(), Some("ug/m3"));
        assert_eq!(r.year(), 2024);
        assert!(!r.imputed);
    }

    #[test]
    fn non_finite_value_is_missing() {
        let r = Reading::observed("Pance", at(5), "PM2.5", None, f64::NAN);
        assert!(r.is_missing());
        let r = Reading::observed("Pance", at(5), "PM2.5", None, f64::INFINITY);
        assert!(r.is_missing());
    }

    #[test]
    fn series_key_is_station_and_pollutant() {
        let r = Reading::missing("Flora", at(1), "O3", None);
        assert_eq!(r.series_key(), ("Flora".to_string(), "O3".to_string()));
    }
}
