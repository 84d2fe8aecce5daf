//! Core types and the open-data API client for municipal air quality data.
//!
//! The ETL stages in `aq-data` and the warehouse in `aq-db` share the types
//! defined here. Network access lives behind the `api` feature so the pure
//! crates never pull in an HTTP stack.

#[cfg(feature = "api")]
pub mod api;
pub mod error;
pub mod reading;
pub mod source;
pub mod table;
pub mod time_bucket;
pub mod timestamp;
