//! Bounded linear gap filling for hourly pollutant series.
//!
//! A missing point is filled only when a real observation exists on both
//! sides and each one is at most `max_gap` away. Values are linear in
//! elapsed time between the two neighbors. Nothing is extrapolated past
//! the first or last observation.

use aq_core::reading::Reading;
use chrono::{NaiveDateTime, TimeDelta};

/// Default bound on the distance to a real neighbor: five days.
pub const DEFAULT_MAX_GAP_HOURS: i64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImputationPolicy {
    pub max_gap: TimeDelta,
}

impl Default for ImputationPolicy {
    fn default() -> Self {
        ImputationPolicy::from_hours(DEFAULT_MAX_GAP_HOURS)
    }
}

impl ImputationPolicy {
    pub fn from_hours(hours: i64) -> ImputationPolicy {
        ImputationPolicy {
            max_gap: TimeDelta::try_hours(hours.max(0)).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Widest distance between two real observations that can still
    /// contain a fillable point.
    pub fn max_span(&self) -> TimeDelta {
        self.max_gap
            .checked_add(&self.max_gap)
            .unwrap_or(TimeDelta::MAX)
    }
}

/// Insert a missing point at every absent hourly slot between consecutive
/// readings of a sorted series.
///
/// Gaps wider than `max_span` get no slots, since none of them could be
/// filled.
pub fn regularize_hourly(series: &[Reading], max_span: TimeDelta) -> Vec<Reading> {
    let hour = TimeDelta::hours(1);
    let mut result = Vec::with_capacity(series.len());

    for (i, reading) in series.iter().enumerate() {
        result.push(reading.clone());
        let Some(next) = series.get(i + 1) else {
            continue;
        };
        if next.timestamp - reading.timestamp > max_span {
            continue;
        }
        let mut slot = reading.timestamp + hour;
        while slot < next.timestamp {
            result.push(Reading::missing(
                &reading.station,
                slot,
                &reading.pollutant,
                reading.unit.as_deref(),
            ));
            slot += hour;
        }
    }
    result
}

fn interpolate(at: NaiveDateTime, before: (NaiveDateTime, f64), after: (NaiveDateTime, f64)) -> f64 {
    let span = (after.0 - before.0).num_seconds() as f64;
    let elapsed = (at - before.0).num_seconds() as f64;
    before.1 + (after.1 - before.1) * elapsed / span
}

/// Fill missing points of one (station, pollutant) series.
///
/// The series must be sorted by time with unique timestamps. Filled
/// readings are flagged `imputed`; the rest are returned unchanged.
pub fn impute(series: &[Reading], policy: &ImputationPolicy) -> Vec<Reading> {
    let n = series.len();

    // Nearest real observation at or before / at or after each index.
    let mut previous: Vec<Option<(NaiveDateTime, f64)>> = vec![None; n];
    let mut last = None;
    for (i, r) in series.iter().enumerate() {
        if let Some(v) = r.value {
            last = Some((r.timestamp, v));
        }
        previous[i] = last;
    }
    let mut following: Vec<Option<(NaiveDateTime, f64)>> = vec![None; n];
    let mut next = None;
    for (i, r) in series.iter().enumerate().rev() {
        if let Some(v) = r.value {
            next = Some((r.timestamp, v));
        }
        following[i] = next;
    }

    series
        .iter()
        .enumerate()
        .map(|(i, r)| {
            if r.value.is_some() {
                return r.clone();
            }
            match (previous[i], following[i]) {
                (Some(before), Some(after))
                    if r.timestamp - before.0 <= policy.max_gap
                        && after.0 - r.timestamp <= policy.max_gap =>
                {
                    Reading {
                        value: Some(interpolate(r.timestamp, before, after)),
                        imputed: true,
                        ..r.clone()
                    }
                }
                _ => r.clone(),
            }
        })
        .collect()
}
