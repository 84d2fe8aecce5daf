//! Regulatory reference limits drawn on dashboard charts.

use crate::breakpoints::normalize_code;
use serde::{Deserialize, Serialize};

pub const WHO: &str = "WHO";
pub const NATIONAL: &str = "IDEAM";

/// One reference value for a pollutant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLimit {
    pub pollutant: String,
    pub authority: String,
    /// Averaging period, e.g. "24h", "8h", "annual".
    pub period: String,
    pub value: f64,
    pub unit: String,
}

// (pollutant, authority, period, value) in ug/m3
const FALLBACK: &[(&str, &str, &str, f64)] = &[
    ("PM2.5", WHO, "24h", 15.0),
    ("PM2.5", NATIONAL, "24h", 37.0),
    ("PM10", WHO, "24h", 45.0),
    ("PM10", NATIONAL, "24h", 75.0),
    ("O3", WHO, "8h", 100.0),
    ("O3", NATIONAL, "8h", 100.0),
    ("CO", WHO, "8h", 10000.0),
    ("CO", NATIONAL, "8h", 10000.0),
    ("SO2", WHO, "24h", 40.0),
    ("SO2", NATIONAL, "24h", 65.0),
    ("NO2", WHO, "24h", 25.0),
    ("NO2", WHO, "annual", 10.0),
    ("NO2", NATIONAL, "1h", 200.0),
    ("NO2", NATIONAL, "annual", 40.0),
    ("H2S", WHO, "24h", 100.0),
    ("H2S", NATIONAL, "24h", 100.0),
];

/// Compiled-in limits for a pollutant, matched on its normalized code.
pub fn fallback_limits(pollutant: &str) -> Vec<ReferenceLimit> {
    let code = normalize_code(pollutant);
    FALLBACK
        .iter()
        .filter(|(p, ..)| *p == code)
        .map(|(p, authority, period, value)| ReferenceLimit {
            pollutant: p.to_string(),
            authority: authority.to_string(),
            period: period.to_string(),
            value: *value,
            unit: "ug/m3".to_string(),
        })
        .collect()
}

/// Every compiled-in limit, for seeding the warehouse.
pub fn all_fallback_limits() -> Vec<ReferenceLimit> {
    let mut codes: Vec<&str> = FALLBACK.iter().map(|(p, ..)| *p).collect();
    codes.dedup();
    codes.into_iter().flat_map(fallback_limits).collect()
}

/// The national 24-hour limit among `limits`, if any.
pub fn national_24h(limits: &[ReferenceLimit]) -> Option<f64> {
    limits
        .iter()
        .find(|l| l.authority.eq_ignore_ascii_case(NATIONAL) && l.period == "24h")
        .map(|l| l.value)
}
