//! Query result model structs.
//!
//! All structs derive `Serialize` so query results can be exported as JSON
//! or CSV by the command layer.

use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StationInfo {
    pub station_id: i64,
    pub name: String,
    /// Upper-cased name.
    pub code: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PollutantInfo {
    pub pollutant_id: i64,
    pub code: String,
    pub unit: Option<String>,
}

/// One point of a measurement time series.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MeasurementPoint {
    /// Start of the hour, "YYYY-MM-DD HH:MM:SS".
    pub timestamp: String,
    pub value: f64,
    pub imputed: bool,
}

/// One point of an AQI time series.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AqiPoint {
    pub timestamp: String,
    pub index_value: i64,
    pub sub_index: f64,
    pub category: String,
    pub dominant_pollutant: String,
    pub source: String,
}
