//! Wide, loosely typed tables as they arrive from upstream.
//!
//! A [`RawTable`] is one row per timestamp and one column per field, every
//! cell kept as text. Typing and reshaping happen later, in `aq-data`.

use csv::ReaderBuilder;
use serde_json::{Map, Value};

/// Header fragments that mark a date (case-insensitive).
pub const DATE_MARKERS: &[&str] = &["fecha", "date"];

/// Header fragments that mark a time of day (case-insensitive).
pub const TIME_MARKERS: &[&str] = &["hora", "time"];

/// Whole headers that name a timestamp column on their own.
pub const TIMESTAMP_HEADERS: &[&str] = &["timestamp", "datetime"];

/// A wide table of optional text cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> RawTable {
        RawTable {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding short rows with missing cells and dropping
    /// cells beyond the header.
    pub fn push_row(&mut self, mut row: Vec<Option<String>>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of the first column whose header carries both a date and a
    /// time marker, e.g. "Fecha & Hora" or "Date Time". Failing that, a
    /// column named "timestamp" or "datetime".
    pub fn timestamp_column(&self) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| {
                let lowered = c.to_lowercase();
                DATE_MARKERS.iter().any(|m| lowered.contains(m))
                    && TIME_MARKERS.iter().any(|m| lowered.contains(m))
            })
            .or_else(|| {
                self.columns.iter().position(|c| {
                    TIMESTAMP_HEADERS
                        .iter()
                        .any(|h| c.trim().eq_ignore_ascii_case(h))
                })
            })
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(|c| c.as_deref())
    }

    /// Build a table from the flat JSON objects of a datastore response.
    ///
    /// Columns are the union of keys in first-seen order. Strings are kept
    /// verbatim, numbers and booleans rendered as text, nulls become
    /// missing cells.
    pub fn from_json_records(records: &[Map<String, Value>]) -> RawTable {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        let mut table = RawTable::new(columns);
        for record in records {
            let row = table
                .columns
                .iter()
                .map(|c| record.get(c).and_then(json_cell))
                .collect();
            table.rows.push(row);
        }
        table
    }

    /// Build a table from CSV text with a header row. Empty cells are
    /// missing.
    pub fn from_csv_str(data: &str) -> Result<RawTable, csv::Error> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(data.as_bytes());
        let columns = rdr.headers()?.iter().map(String::from).collect();
        let mut table = RawTable::new(columns);
        for result in rdr.records() {
            let record = result?;
            let row = record
                .iter()
                .map(|c| Some(c.to_string()).filter(|s| !s.trim().is_empty()))
                .collect();
            table.push_row(row);
        }
        Ok(table)
    }
}

fn json_cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}
