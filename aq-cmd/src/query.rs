//! Read-side commands: schema setup and CSV exports of the warehouse.
//!
//! Every export writes CSV with a header row to any `Write`, so the
//! commands print to stdout and the tests write into a buffer. An empty
//! result or an unknown station is reported in the log, not as an error.

use crate::config::Config;
use aq_data::limits::{all_fallback_limits, national_24h};
use aq_data::summary::summarize;
use aq_db::cache::{CachedQueries, DEFAULT_TTL};
use aq_db::models::StationInfo;
use aq_db::Database;
use aq_utils::dates::{date_range, DateRange};
use log::info;
use serde::Serialize;
use std::io::{self, Write};

/// Write `rows` as CSV with a header row. Returns the row count.
pub fn write_csv<T: Serialize, W: Write>(out: W, rows: &[T]) -> anyhow::Result<usize> {
    let mut wtr = csv::Writer::from_writer(out);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(rows.len())
}

fn lookup_station(db: &Database, name: &str) -> anyhow::Result<Option<StationInfo>> {
    let station = db.find_station(name)?;
    if station.is_none() {
        let known: Vec<String> = db.query_stations()?.into_iter().map(|s| s.name).collect();
        info!("No station named {:?}. Known stations: {}", name, known.join(", "));
    }
    Ok(station)
}

// ───────────────────── init-db ─────────────────────

pub fn init_db(db: &Database, seed_limits: bool) -> anyhow::Result<usize> {
    if !seed_limits {
        return Ok(0);
    }
    let seeded = db.seed_reference_limits(&all_fallback_limits())?;
    info!("Seeded {} reference limits", seeded);
    Ok(seeded)
}

pub fn run_init_db(config: &Config, seed_limits: bool) -> anyhow::Result<()> {
    let db = config.open_database()?;
    init_db(&db, seed_limits)?;
    info!("Warehouse ready at {}", config.database.display());
    Ok(())
}

// ───────────────────── Series exports ─────────────────────

pub fn export_measurements<W: Write>(
    cached: &mut CachedQueries,
    out: W,
    station: &str,
    pollutant: &str,
    range: Option<DateRange>,
) -> anyhow::Result<usize> {
    let Some(station) = lookup_station(cached.database(), station)? else {
        return Ok(0);
    };
    let Some(pollutant) = cached.database().find_pollutant(pollutant)? else {
        info!("No measurements of {} are stored", pollutant);
        return Ok(0);
    };

    let points = cached.measurements(station.station_id, pollutant.pollutant_id, range)?;
    if points.is_empty() {
        info!("No {} data for {} in the requested range", pollutant.code, station.name);
        return Ok(0);
    }
    write_csv(out, &points)
}

pub fn export_aqi<W: Write>(
    cached: &mut CachedQueries,
    out: W,
    station: &str,
    range: Option<DateRange>,
) -> anyhow::Result<usize> {
    let Some(station) = lookup_station(cached.database(), station)? else {
        return Ok(0);
    };
    let points = cached.aqi(station.station_id, range)?;
    if points.is_empty() {
        info!("No AQI records for {} in the requested range", station.name);
        return Ok(0);
    }
    write_csv(out, &points)
}

pub fn run_measurements(
    config: &Config,
    station: &str,
    pollutant: &str,
    start: Option<&str>,
    end: Option<&str>,
) -> anyhow::Result<()> {
    let range = date_range(start, end)?;
    let mut cached = CachedQueries::new(config.open_database()?, DEFAULT_TTL);
    export_measurements(&mut cached, io::stdout().lock(), station, pollutant, range)?;
    Ok(())
}

pub fn run_aqi(
    config: &Config,
    station: &str,
    start: Option<&str>,
    end: Option<&str>,
) -> anyhow::Result<()> {
    let range = date_range(start, end)?;
    let mut cached = CachedQueries::new(config.open_database()?, DEFAULT_TTL);
    export_aqi(&mut cached, io::stdout().lock(), station, range)?;
    Ok(())
}

// ───────────────────── KPI summary ─────────────────────

/// One line of the `summary` output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub pollutant: String,
    pub unit: String,
    pub samples: usize,
    pub mean: f64,
    pub max: f64,
    pub percent_of_limit: Option<f64>,
    pub trend: String,
}

/// KPIs of every pollutant measured at `station`, in pollutant order.
pub fn station_summary(
    cached: &mut CachedQueries,
    station: &StationInfo,
    range: Option<DateRange>,
) -> anyhow::Result<Vec<SummaryRow>> {
    let pollutants = cached.database().query_pollutants_for_station(station.station_id)?;
    let mut rows = Vec::with_capacity(pollutants.len());
    for pollutant in pollutants {
        let values: Vec<f64> = cached
            .measurements(station.station_id, pollutant.pollutant_id, range)?
            .iter()
            .map(|p| p.value)
            .collect();
        let limits = cached.database().query_reference_limits(&pollutant.code)?;
        if let Some(kpi) = summarize(&pollutant.code, &values, national_24h(&limits)) {
            rows.push(SummaryRow {
                pollutant: kpi.pollutant,
                unit: pollutant.unit.unwrap_or_default(),
                samples: kpi.samples,
                mean: kpi.mean,
                max: kpi.max,
                percent_of_limit: kpi.percent_of_limit,
                trend: kpi.trend.to_string(),
            });
        }
    }
    Ok(rows)
}

pub fn export_summary<W: Write>(
    cached: &mut CachedQueries,
    out: W,
    station: &str,
    range: Option<DateRange>,
) -> anyhow::Result<usize> {
    let Some(station) = lookup_station(cached.database(), station)? else {
        return Ok(0);
    };
    let rows = station_summary(cached, &station, range)?;
    if rows.is_empty() {
        info!("No measurements for {} in the requested range", station.name);
        return Ok(0);
    }
    write_csv(out, &rows)
}

pub fn run_summary(
    config: &Config,
    station: &str,
    start: Option<&str>,
    end: Option<&str>,
) -> anyhow::Result<()> {
    let range = date_range(start, end)?;
    let mut cached = CachedQueries::new(config.open_database()?, DEFAULT_TTL);
    export_summary(&mut cached, io::stdout().lock(), station, range)?;
    Ok(())
}

// ───────────────────── Run log ─────────────────────

pub fn export_run_log<W: Write>(db: &Database, out: W, limit: usize) -> anyhow::Result<usize> {
    let entries = db.query_run_log(limit)?;
    if entries.is_empty() {
        info!("The run log is empty");
        return Ok(0);
    }
    write_csv(out, &entries)
}

pub fn run_run_log(config: &Config, limit: usize) -> anyhow::Result<()> {
    let db = config.open_database()?;
    export_run_log(&db, io::stdout().lock(), limit)?;
    Ok(())
}
