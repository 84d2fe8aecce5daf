//! Data processing for air quality readings.
//!
//! This crate turns raw upstream tables into long-format readings, fills
//! short gaps, and derives the Air Quality Index per station and hour.

pub mod aqi;
pub mod breakpoints;
pub mod imputation;
pub mod limits;
pub mod manual;
pub mod reshape;
pub mod summary;
pub mod transform;
