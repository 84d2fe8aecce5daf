//! Cleaning pipeline between reshaping and loading.

use crate::imputation::{impute, regularize_hourly, ImputationPolicy};
use aq_core::reading::Reading;
use chrono::NaiveDateTime;
use log::info;
use std::collections::{BTreeMap, HashSet};

/// Counts reported by [`transform`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformSummary {
    pub input: usize,
    pub duplicates: usize,
    pub imputed: usize,
    /// Hourly slots that stayed missing and were dropped.
    pub unfilled: usize,
    pub output: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transformed {
    pub readings: Vec<Reading>,
    pub summary: TransformSummary,
}

/// Drop repeated (station, pollutant, timestamp) readings, first one wins.
pub fn deduplicate(readings: Vec<Reading>) -> Vec<Reading> {
    let mut seen: HashSet<(String, String, NaiveDateTime)> = HashSet::new();
    readings
        .into_iter()
        .filter(|r| seen.insert((r.station.clone(), r.pollutant.clone(), r.timestamp)))
        .collect()
}

/// Split readings into per-(station, pollutant) series sorted by time.
pub fn group_series(readings: Vec<Reading>) -> BTreeMap<(String, String), Vec<Reading>> {
    let mut groups: BTreeMap<(String, String), Vec<Reading>> = BTreeMap::new();
    for reading in readings {
        groups.entry(reading.series_key()).or_default().push(reading);
    }
    for series in groups.values_mut() {
        series.sort_by_key(|r| r.timestamp);
    }
    groups
}

/// Deduplicate, regularize to hourly slots, impute short gaps and drop
/// whatever is still missing.
pub fn transform(readings: Vec<Reading>, policy: &ImputationPolicy) -> Transformed {
    let mut summary = TransformSummary {
        input: readings.len(),
        ..Default::default()
    };

    let unique = deduplicate(readings);
    summary.duplicates = summary.input - unique.len();

    let mut output = Vec::with_capacity(unique.len());
    for series in group_series(unique).into_values() {
        let regular = regularize_hourly(&series, policy.max_span());
        for reading in impute(&regular, policy) {
            if reading.is_missing() {
                summary.unfilled += 1;
            } else {
                if reading.imputed {
                    summary.imputed += 1;
                }
                output.push(reading);
            }
        }
    }
    summary.output = output.len();

    info!(
        "Transform: {} readings in, {} duplicates, {} imputed, {} unfilled, {} out",
        summary.input, summary.duplicates, summary.imputed, summary.unfilled, summary.output
    );
    Transformed {
        readings: output,
        summary,
    }
}
