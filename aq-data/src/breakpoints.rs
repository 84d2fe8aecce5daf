//! National AQI breakpoint tables.
//!
//! Each pollutant maps concentration bands onto index bands. Bands are
//! published at a fixed resolution (e.g. 12.0 / 12.1 for PM2.5); a
//! concentration that falls between two bands has no sub-index.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The six ordered severity bands of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Good,
        Category::Moderate,
        Category::UnhealthyForSensitiveGroups,
        Category::Unhealthy,
        Category::VeryUnhealthy,
        Category::Hazardous,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Good => "Good",
            Category::Moderate => "Moderate",
            Category::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            Category::Unhealthy => "Unhealthy",
            Category::VeryUnhealthy => "Very Unhealthy",
            Category::Hazardous => "Hazardous",
        }
    }

    pub fn from_label(label: &str) -> Option<Category> {
        Category::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(label.trim()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One concentration band and the index band it maps to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub conc_low: f64,
    pub conc_high: f64,
    pub index_low: f64,
    pub index_high: f64,
    pub category: Category,
}

impl Breakpoint {
    pub fn contains(&self, concentration: f64) -> bool {
        self.conc_low <= concentration && concentration <= self.conc_high
    }
}

/// Breakpoints for one pollutant, sorted ascending.
#[derive(Debug, Clone, Copy)]
pub struct PollutantTable {
    pub code: &'static str,
    /// Reciprocal of the published resolution (10 means 0.1); adjacent
    /// bands are one resolution step apart.
    pub scale: f64,
    pub bands: &'static [Breakpoint],
}

impl PollutantTable {
    pub fn band_for(&self, concentration: f64) -> Option<&'static Breakpoint> {
        self.bands.iter().find(|b| b.contains(concentration))
    }
}

const fn bp(
    conc_low: f64,
    conc_high: f64,
    index_low: f64,
    index_high: f64,
    category: Category,
) -> Breakpoint {
    Breakpoint {
        conc_low,
        conc_high,
        index_low,
        index_high,
        category,
    }
}

use Category::*;

const PM25: &[Breakpoint] = &[
    bp(0.0, 12.0, 0.0, 50.0, Good),
    bp(12.1, 35.4, 51.0, 100.0, Moderate),
    bp(35.5, 55.4, 101.0, 150.0, UnhealthyForSensitiveGroups),
    bp(55.5, 150.4, 151.0, 200.0, Unhealthy),
    bp(150.5, 250.4, 201.0, 300.0, VeryUnhealthy),
    bp(250.5, 500.4, 301.0, 500.0, Hazardous),
];

const PM10: &[Breakpoint] = &[
    bp(0.0, 54.0, 0.0, 50.0, Good),
    bp(55.0, 154.0, 51.0, 100.0, Moderate),
    bp(155.0, 254.0, 101.0, 150.0, UnhealthyForSensitiveGroups),
    bp(255.0, 354.0, 151.0, 200.0, Unhealthy),
    bp(355.0, 424.0, 201.0, 300.0, VeryUnhealthy),
    bp(425.0, 604.0, 301.0, 500.0, Hazardous),
];

// No hazardous band is published for 8-hour ozone.
const O3: &[Breakpoint] = &[
    bp(0.000, 0.054, 0.0, 50.0, Good),
    bp(0.055, 0.070, 51.0, 100.0, Moderate),
    bp(0.071, 0.085, 101.0, 150.0, UnhealthyForSensitiveGroups),
    bp(0.086, 0.105, 151.0, 200.0, Unhealthy),
    bp(0.106, 0.200, 201.0, 300.0, VeryUnhealthy),
];

const CO: &[Breakpoint] = &[
    bp(0.0, 4.4, 0.0, 50.0, Good),
    bp(4.5, 9.4, 51.0, 100.0, Moderate),
    bp(9.5, 12.4, 101.0, 150.0, UnhealthyForSensitiveGroups),
    bp(12.5, 15.4, 151.0, 200.0, Unhealthy),
    bp(15.5, 30.4, 201.0, 300.0, VeryUnhealthy),
    bp(30.5, 50.4, 301.0, 500.0, Hazardous),
];

const NO2: &[Breakpoint] = &[
    bp(0.0, 53.0, 0.0, 50.0, Good),
    bp(54.0, 100.0, 51.0, 100.0, Moderate),
    bp(101.0, 360.0, 101.0, 150.0, UnhealthyForSensitiveGroups),
    bp(361.0, 649.0, 151.0, 200.0, Unhealthy),
    bp(650.0, 1249.0, 201.0, 300.0, VeryUnhealthy),
    bp(1250.0, 2049.0, 301.0, 500.0, Hazardous),
];

const SO2: &[Breakpoint] = &[
    bp(0.0, 35.0, 0.0, 50.0, Good),
    bp(36.0, 75.0, 51.0, 100.0, Moderate),
    bp(76.0, 185.0, 101.0, 150.0, UnhealthyForSensitiveGroups),
    bp(186.0, 304.0, 151.0, 200.0, Unhealthy),
    bp(305.0, 604.0, 201.0, 300.0, VeryUnhealthy),
    bp(605.0, 1004.0, 301.0, 500.0, Hazardous),
];

const H2S: &[Breakpoint] = &[
    bp(0.0, 30.0, 0.0, 50.0, Good),
    bp(31.0, 70.0, 51.0, 100.0, Moderate),
    bp(71.0, 150.0, 101.0, 150.0, UnhealthyForSensitiveGroups),
    bp(151.0, 225.0, 151.0, 200.0, Unhealthy),
    bp(226.0, 300.0, 201.0, 300.0, VeryUnhealthy),
    bp(301.0, 500.0, 301.0, 500.0, Hazardous),
];

/// Every pollutant with a published table, in lookup order.
pub const TABLES: &[PollutantTable] = &[
    PollutantTable { code: "PM2.5", scale: 10.0, bands: PM25 },
    PollutantTable { code: "PM10", scale: 1.0, bands: PM10 },
    PollutantTable { code: "O3", scale: 1000.0, bands: O3 },
    PollutantTable { code: "CO", scale: 10.0, bands: CO },
    PollutantTable { code: "NO2", scale: 1.0, bands: NO2 },
    PollutantTable { code: "SO2", scale: 1.0, bands: SO2 },
    PollutantTable { code: "H2S", scale: 1.0, bands: H2S },
];

/// Canonical form of a pollutant code: unit suffix dropped, whitespace
/// removed, upper-cased, decimal comma replaced ("pm 2,5 (ug/m3)" -> "PM2.5").
pub fn normalize_code(code: &str) -> String {
    let name = code.split('(').next().unwrap_or(code);
    name.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c.to_ascii_uppercase() })
        .collect()
}

/// Breakpoint table for a pollutant code, matched case-insensitively.
pub fn table_for(code: &str) -> Option<&'static PollutantTable> {
    let code = normalize_code(code);
    TABLES.iter().find(|t| t.code == code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_sorted_and_contiguous() {
        for table in TABLES {
            let step = 1.0 / table.scale;
            for pair in table.bands.windows(2) {
                assert!(pair[0].conc_high < pair[1].conc_low, "{}", table.code);
                assert!(
                    (pair[1].conc_low - pair[0].conc_high - step).abs() < 1e-9,
                    "{} bands {:?} / {:?}",
                    table.code,
                    pair[0],
                    pair[1]
                );
                assert_eq!(pair[0].index_high + 1.0, pair[1].index_low);
                assert!(pair[0].category < pair[1].category);
            }
        }
    }

    #[test]
    fn codes_normalize() {
        assert_eq!(normalize_code("pm2.5"), "PM2.5");
        assert_eq!(normalize_code(" PM2,5 "), "PM2.5");
        assert_eq!(normalize_code("PM 10 (ug/m3)"), "PM10");
        assert!(table_for("o3").is_some());
        assert!(table_for("Benzene").is_none());
    }

    #[test]
    fn values_between_bands_have_no_band() {
        let pm25 = table_for("PM2.5").unwrap();
        assert!(pm25.band_for(12.05).is_none());
        assert_eq!(pm25.band_for(12.0).unwrap().category, Category::Good);
        assert_eq!(pm25.band_for(12.1).unwrap().category, Category::Moderate);
        let pm10 = table_for("PM10").unwrap();
        assert!(pm10.band_for(54.9).is_none());
        let o3 = table_for("O3").unwrap();
        assert!(o3.band_for(0.0549).is_none());
    }

    #[test]
    fn category_labels_round_trip() {
        for c in Category::ALL {
            assert_eq!(Category::from_label(c.label()), Some(c));
        }
        assert_eq!(Category::from_label("unknown"), None);
    }
}
