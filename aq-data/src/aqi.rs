//! Air Quality Index calculation.
//!
//! A sub-index is computed per pollutant by linear interpolation inside its
//! breakpoint band. The index of a station-hour is the highest sub-index
//! among its readings; that pollutant is the dominant one.

use crate::breakpoints::{table_for, Category};
use aq_core::reading::Reading;
use chrono::{NaiveDateTime, Timelike};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Why a concentration produced no sub-index.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Unmappable {
    #[error("No breakpoint table for pollutant {0}")]
    UnknownPollutant(String),

    #[error("Concentration {concentration} of {pollutant} is outside every band")]
    OutOfRange { pollutant: String, concentration: f64 },
}

/// A pollutant's contribution to the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubIndex {
    /// Normalized pollutant code.
    pub pollutant: String,
    /// Index value rounded to 2 decimals.
    pub value: f64,
    pub category: Category,
}

/// How an index record was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComputationSource {
    /// Derived from the API extraction.
    Automatic,
    /// Derived from a manually curated CSV file.
    Manual,
}

impl ComputationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputationSource::Automatic => "automatic",
            ComputationSource::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<ComputationSource> {
        match s.trim().to_lowercase().as_str() {
            "automatic" => Some(ComputationSource::Automatic),
            "manual" => Some(ComputationSource::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for ComputationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index of one station at one hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqiRecord {
    pub station: String,
    /// Start of the hour.
    pub timestamp: NaiveDateTime,
    /// Dominant sub-index rounded and clamped to 0..=500.
    pub index_value: u16,
    /// Dominant sub-index with 2 decimals.
    pub sub_index: f64,
    pub category: Category,
    pub dominant_pollutant: String,
    pub source: ComputationSource,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Sub-index of a single concentration.
pub fn compute_subindex(pollutant: &str, concentration: f64) -> Result<SubIndex, Unmappable> {
    let table =
        table_for(pollutant).ok_or_else(|| Unmappable::UnknownPollutant(pollutant.to_string()))?;
    let out_of_range = || Unmappable::OutOfRange {
        pollutant: table.code.to_string(),
        concentration,
    };
    if !concentration.is_finite() {
        return Err(out_of_range());
    }

    let band = table.band_for(concentration).ok_or_else(out_of_range)?;
    let value = (band.index_high - band.index_low) / (band.conc_high - band.conc_low)
        * (concentration - band.conc_low)
        + band.index_low;

    Ok(SubIndex {
        pollutant: table.code.to_string(),
        value: round2(value),
        category: band.category,
    })
}

fn hour_start(ts: &NaiveDateTime) -> NaiveDateTime {
    ts.date().and_hms_opt(ts.hour(), 0, 0).unwrap_or(*ts)
}

/// Index of one station-hour from its readings.
///
/// Readings without a value or without a mappable sub-index are skipped.
/// Returns `None` when nothing is mappable. Ties go to the first reading
/// encountered. Station and hour are taken from the first mappable reading.
pub fn compute_station_hour<'a, I>(readings: I) -> Option<AqiRecord>
where
    I: IntoIterator<Item = &'a Reading>,
{
    let mut dominant: Option<(&Reading, SubIndex)> = None;

    for reading in readings {
        let Some(value) = reading.value else {
            continue;
        };
        let sub = match compute_subindex(&reading.pollutant, value) {
            Ok(sub) => sub,
            Err(e) => {
                debug!("Skipping {} at {}: {}", reading.station, reading.timestamp, e);
                continue;
            }
        };
        let replace = match &dominant {
            Some((_, best)) => sub.value > best.value,
            None => true,
        };
        if replace {
            dominant = Some((reading, sub));
        }
    }

    let (first, sub) = dominant?;
    Some(AqiRecord {
        station: first.station.clone(),
        timestamp: hour_start(&first.timestamp),
        index_value: sub.value.round().clamp(0.0, 500.0) as u16,
        sub_index: sub.value,
        category: sub.category,
        dominant_pollutant: sub.pollutant,
        source: ComputationSource::Automatic,
    })
}

/// Index records for every station-hour of a batch, ordered by station
/// and time.
pub fn compute_all(readings: &[Reading], source: ComputationSource) -> Vec<AqiRecord> {
    let mut groups: BTreeMap<(&str, NaiveDateTime), Vec<&Reading>> = BTreeMap::new();
    for reading in readings {
        groups
            .entry((reading.station.as_str(), hour_start(&reading.timestamp)))
            .or_default()
            .push(reading);
    }

    groups
        .into_values()
        .filter_map(|group| compute_station_hour(group))
        .map(|record| AqiRecord { source, ..record })
        .collect()
}
