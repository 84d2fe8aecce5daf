//! Wide-to-long reshaping of upstream tables.
//!
//! Upstream payloads carry one row per timestamp and one column per
//! pollutant, with numbers encoded as text in several ways. [`normalize`]
//! turns such a table into one [`Reading`] per (timestamp, pollutant).

use aq_core::reading::Reading;
use aq_core::table::RawTable;
use aq_core::timestamp::parse_timestamp;
use log::{debug, warn};
use std::collections::HashSet;
use thiserror::Error;

/// Cell values that mean "no observation" (compared case-insensitively).
pub const MISSING_SENTINELS: &[&str] = &["", "ND", "None", "nan", "null", "N/A"];

/// Prefix of internal bookkeeping columns such as the datastore's `_id`.
pub const INTERNAL_COLUMN_PREFIX: char = '_';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReshapeError {
    #[error("No timestamp column found in the payload")]
    MissingTimestampColumn,

    #[error("Pollutant column {0:?} appears more than once")]
    DuplicateColumn(String),
}

/// Result of reshaping one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub readings: Vec<Reading>,
    /// Rows whose timestamp could not be parsed.
    pub dropped_rows: usize,
    /// Cells dropped because they held no usable number.
    pub missing_values: usize,
}

/// Split a "name (unit)" label into its parts.
///
/// ```
/// use aq_data::reshape::split_label;
/// assert_eq!(split_label("O3 (ug/m3)"), ("O3".to_string(), Some("ug/m3".to_string())));
/// assert_eq!(split_label(" PM10 "), ("PM10".to_string(), None));
/// ```
pub fn split_label(label: &str) -> (String, Option<String>) {
    let label = label.trim();
    match (label.find('('), label.rfind(')')) {
        (Some(open), Some(close)) if open < close => {
            let unit = label[open + 1..close].trim();
            let name = format!("{}{}", label[..open].trim_end(), &label[close + 1..]);
            let unit = Some(unit.to_string()).filter(|u| !u.is_empty());
            (name.trim().to_string(), unit)
        }
        _ => (label.to_string(), None),
    }
}

/// Parse a cell as a concentration.
///
/// Sentinels and unparseable text give `None`. A decimal comma is accepted.
pub fn clean_value(cell: Option<&str>) -> Option<f64> {
    let text = cell?.trim();
    if MISSING_SENTINELS.iter().any(|s| s.eq_ignore_ascii_case(text)) {
        return None;
    }
    text.replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

struct PollutantColumn {
    index: usize,
    code: String,
    unit: Option<String>,
}

fn pollutant_columns(table: &RawTable, timestamp: usize) -> Result<Vec<PollutantColumn>, ReshapeError> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();

    for (index, header) in table.columns.iter().enumerate() {
        let trimmed = header.trim();
        if index == timestamp || trimmed.is_empty() || trimmed.starts_with(INTERNAL_COLUMN_PREFIX) {
            continue;
        }
        if !seen.insert(trimmed.to_string()) {
            return Err(ReshapeError::DuplicateColumn(trimmed.to_string()));
        }
        let (code, unit) = split_label(trimmed);
        columns.push(PollutantColumn { index, code, unit });
    }
    Ok(columns)
}

/// Reshape a wide table into long-format readings for one station.
///
/// Rows with an unparseable timestamp are dropped and counted; empty or
/// unparseable cells are skipped.
pub fn normalize(table: &RawTable, station: &str) -> Result<Normalized, ReshapeError> {
    let timestamp = table
        .timestamp_column()
        .ok_or(ReshapeError::MissingTimestampColumn)?;
    let columns = pollutant_columns(table, timestamp)?;

    let mut result = Normalized::default();
    for row in 0..table.len() {
        let Some(ts) = table.cell(row, timestamp).and_then(parse_timestamp) else {
            debug!("Unparseable timestamp {:?} in row {}", table.cell(row, timestamp), row);
            result.dropped_rows += 1;
            continue;
        };
        for column in &columns {
            match clean_value(table.cell(row, column.index)) {
                Some(value) => result.readings.push(Reading::observed(
                    station,
                    ts,
                    &column.code,
                    column.unit.as_deref(),
                    value,
                )),
                None => result.missing_values += 1,
            }
        }
    }

    if result.dropped_rows > 0 {
        warn!(
            "{}: dropped {} rows with unparseable timestamps",
            station, result.dropped_rows
        );
    }
    Ok(result)
}
