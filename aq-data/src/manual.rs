//! Manually curated CSV sheets.
//!
//! A sheet has `Station`, `Start Date` and `End Date` columns plus exactly
//! one pollutant column. The reading's timestamp is the start date.

use crate::reshape::{clean_value, split_label};
use aq_core::reading::Reading;
use aq_core::timestamp::parse_timestamp;
use csv::ReaderBuilder;
use log::warn;
use thiserror::Error;

const STATION_HEADERS: &[&str] = &["station", "estacion", "estación"];
const START_HEADERS: &[&str] = &["start date", "fecha inicial"];
const END_HEADERS: &[&str] = &["end date", "fecha final"];

#[derive(Error, Debug)]
pub enum ManualCsvError {
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Expected exactly one pollutant column, found {}: [{}]", .0.len(), .0.join(", "))]
    AmbiguousPollutantColumn(Vec<String>),

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Parsed content of one sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualSheet {
    /// Upper-cased pollutant code.
    pub pollutant: String,
    pub unit: Option<String>,
    pub readings: Vec<Reading>,
    /// Rows without a station, a parseable start date or a usable value.
    pub dropped_rows: usize,
}

fn find_header(headers: &[String], names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
}

/// Parse a manual sheet.
pub fn parse_manual_csv(data: &str) -> Result<ManualSheet, ManualCsvError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data.as_bytes());
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();

    let station = find_header(&headers, STATION_HEADERS);
    let start = find_header(&headers, START_HEADERS);
    let end = find_header(&headers, END_HEADERS);

    let (station, start, end) = match (station, start, end) {
        (Some(station), Some(start), Some(end)) => (station, start, end),
        _ => {
            let missing = [("Station", station), ("Start Date", start), ("End Date", end)]
                .into_iter()
                .filter(|(_, idx)| idx.is_none())
                .map(|(name, _)| name.to_string())
                .collect();
            return Err(ManualCsvError::MissingColumns(missing));
        }
    };

    let candidates: Vec<(usize, &String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, h)| ![station, start, end].contains(i) && !h.is_empty())
        .collect();
    let (value_idx, label) = match candidates.as_slice() {
        [(idx, label)] => (*idx, *label),
        _ => {
            return Err(ManualCsvError::AmbiguousPollutantColumn(
                candidates.iter().map(|(_, h)| h.to_string()).collect(),
            ))
        }
    };
    let (name, unit) = split_label(label);
    let pollutant = name.to_uppercase();

    let mut readings = Vec::new();
    let mut dropped_rows = 0;
    for result in rdr.records() {
        let record = result?;
        let station_name = record.get(station).map(str::trim).unwrap_or_default();
        let ts = record.get(start).and_then(parse_timestamp);
        let value = clean_value(record.get(value_idx));
        match (station_name, ts, value) {
            (s, Some(ts), Some(value)) if !s.is_empty() => {
                readings.push(Reading::observed(s, ts, &pollutant, unit.as_deref(), value));
            }
            _ => dropped_rows += 1,
        }
    }

    if dropped_rows > 0 {
        warn!("{}: dropped {} unusable rows", pollutant, dropped_rows);
    }
    Ok(ManualSheet {
        pollutant,
        unit,
        readings,
        dropped_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn parses_sheet_with_english_headers() {
        let data = "Station,Start Date,End Date,pm10 (ug/m3)\n\
                    Pance,2024-03-01 00:00,2024-03-01 01:00,41\n\
                    Pance,2024-03-01 01:00,2024-03-01 02:00,\"38,5\"\n";
        let sheet = parse_manual_csv(data).unwrap();
        assert_eq!(sheet.pollutant, "PM10");
        assert_eq!(sheet.unit.as_deref(), Some("ug/m3"));
        assert_eq!(sheet.readings.len(), 2);
        assert_eq!(sheet.readings[1].value, Some(38.5));
        assert_eq!(
            sheet.readings[0].timestamp,
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn accepts_spanish_headers_in_any_case() {
        let data = "ESTACION, fecha inicial ,Fecha Final,O3\n\
                    Flora,2024-03-01 05:00:00,2024-03-01 06:00:00,0.031\n";
        let sheet = parse_manual_csv(data).unwrap();
        assert_eq!(sheet.pollutant, "O3");
        assert_eq!(sheet.readings[0].station, "Flora");
    }

    #[test]
    fn bad_rows_are_counted() {
        let data = "Station,Start Date,End Date,SO2\n\
                    Pance,garbage,2024-03-01,4\n\
                    ,2024-03-01 00:00,2024-03-01 01:00,4\n\
                    Pance,2024-03-01 00:00,2024-03-01 01:00,ND\n\
                    Pance,2024-03-01 02:00,2024-03-01 03:00,5\n";
        let sheet = parse_manual_csv(data).unwrap();
        assert_eq!(sheet.readings.len(), 1);
        assert_eq!(sheet.dropped_rows, 3);
    }

    #[test]
    fn several_pollutant_columns_are_rejected() {
        let data = "Station,Start Date,End Date,PM10,PM2.5\n";
        match parse_manual_csv(data) {
            Err(ManualCsvError::AmbiguousPollutantColumn(found)) => {
                assert_eq!(found, vec!["PM10".to_string(), "PM2.5".to_string()]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn no_pollutant_column_is_rejected() {
        let data = "Station,Start Date,End Date\n";
        assert!(matches!(
            parse_manual_csv(data),
            Err(ManualCsvError::AmbiguousPollutantColumn(found)) if found.is_empty()
        ));
    }

    #[test]
    fn missing_columns_are_named() {
        let data = "Station,PM10\nPance,3\n";
        match parse_manual_csv(data) {
            Err(ManualCsvError::MissingColumns(missing)) => {
                assert_eq!(missing, vec!["Start Date".to_string(), "End Date".to_string()]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
