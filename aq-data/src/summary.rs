//! Per-pollutant KPIs shown above the station charts.

use serde::Serialize;
use std::fmt;

/// Series shorter than this have no trend.
pub const MIN_TREND_POINTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    Rising,
    Falling,
    Flat,
    Insufficient,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = match self {
            Trend::Rising => "↑",
            Trend::Falling => "↓",
            Trend::Flat => "→",
            Trend::Insufficient => "—",
        };
        f.write_str(arrow)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollutantSummary {
    pub pollutant: String,
    pub samples: usize,
    pub mean: f64,
    pub max: f64,
    /// Mean as a percentage of the national 24-hour limit, 1 decimal.
    pub percent_of_limit: Option<f64>,
    pub trend: Trend,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Compare the mean of the first and last quarter of a time-ordered series.
pub fn trend(values: &[f64]) -> Trend {
    if values.len() < MIN_TREND_POINTS {
        return Trend::Insufficient;
    }
    let quarter = values.len() / 4;
    let start = mean(&values[..quarter]);
    let end = mean(&values[values.len() - quarter..]);
    if end > start {
        Trend::Rising
    } else if end < start {
        Trend::Falling
    } else {
        Trend::Flat
    }
}

/// Summarize a time-ordered series; `None` when it is empty.
pub fn summarize(pollutant: &str, values: &[f64], limit_24h: Option<f64>) -> Option<PollutantSummary> {
    if values.is_empty() {
        return None;
    }
    let avg = mean(values);
    let max = values.iter().copied().fold(f64::MIN, f64::max);
    let percent_of_limit = limit_24h
        .filter(|limit| *limit > 0.0)
        .map(|limit| round_to(avg / limit * 100.0, 1));

    Some(PollutantSummary {
        pollutant: pollutant.to_string(),
        samples: values.len(),
        mean: round_to(avg, 2),
        max: round_to(max, 2),
        percent_of_limit,
        trend: trend(values),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_rounds_and_compares_to_limit() {
        let s = summarize("PM10", &[10.0, 20.0, 30.333], Some(75.0)).unwrap();
        assert_eq!(s.mean, 20.11);
        assert_eq!(s.max, 30.33);
        assert_eq!(s.percent_of_limit, Some(26.8));
        assert_eq!(s.trend, Trend::Insufficient);
        assert_eq!(s.samples, 3);
    }

    #[test]
    fn empty_series_has_no_summary() {
        assert!(summarize("PM10", &[], None).is_none());
    }

    #[test]
    fn trend_compares_quarters() {
        let rising = [1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0];
        assert_eq!(trend(&rising), Trend::Rising);
        let falling: Vec<f64> = rising.iter().rev().copied().collect();
        assert_eq!(trend(&falling), Trend::Falling);
        assert_eq!(trend(&[5.0; 8]), Trend::Flat);
        assert_eq!(Trend::Rising.to_string(), "↑");
        assert_eq!(Trend::Insufficient.to_string(), "—");
    }
}
