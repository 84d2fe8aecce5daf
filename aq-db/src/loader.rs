//! Idempotent loading of pipeline output into the warehouse.
//!
//! Dimension rows (station by name, pollutant by code and unit, time bucket
//! by year/month/day/hour) are upserted. Fact rows are inserted only when
//! their natural key is new, so re-running a load with overlapping input
//! inserts nothing twice. Each batch runs in one transaction.

use crate::Database;
use anyhow::Context;
use aq_core::reading::Reading;
use aq_core::time_bucket::TimeBucket;
use aq_data::aqi::AqiRecord;
use aq_data::limits::ReferenceLimit;
use aq_utils::dates::{format_date, format_timestamp};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::HashMap;

/// Fact rows written vs. already present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub inserted: usize,
    pub skipped: usize,
}

impl LoadSummary {
    fn record(&mut self, changed: usize) {
        if changed == 0 {
            self.skipped += 1;
        } else {
            self.inserted += 1;
        }
    }
}

/// Counts of a combined measurement and AQI load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub measurements: LoadSummary,
    pub aqi: LoadSummary,
}

/// Dimension keys already resolved in the current batch.
#[derive(Default)]
struct DimensionIds {
    stations: HashMap<String, i64>,
    pollutants: HashMap<(String, String), i64>,
    buckets: HashMap<(i32, u32, u32, u32), i64>,
}

impl DimensionIds {
    fn station(&mut self, conn: &Connection, name: &str) -> rusqlite::Result<i64> {
        if let Some(id) = self.stations.get(name) {
            return Ok(*id);
        }
        conn.prepare_cached(
            "INSERT INTO station (name, code) VALUES (?1, ?2)
             ON CONFLICT (name) DO NOTHING",
        )?
        .execute(params![name, name.to_uppercase()])?;
        let id = conn
            .prepare_cached("SELECT station_id FROM station WHERE name = ?1")?
            .query_row([name], |row| row.get(0))?;
        self.stations.insert(name.to_string(), id);
        Ok(id)
    }

    fn pollutant(&mut self, conn: &Connection, code: &str, unit: Option<&str>) -> rusqlite::Result<i64> {
        let key = (code.to_string(), unit.unwrap_or_default().to_string());
        if let Some(id) = self.pollutants.get(&key) {
            return Ok(*id);
        }
        conn.prepare_cached(
            "INSERT INTO pollutant (code, unit) VALUES (?1, ?2)
             ON CONFLICT (code, unit) DO NOTHING",
        )?
        .execute(params![key.0, key.1])?;
        let id = conn
            .prepare_cached("SELECT pollutant_id FROM pollutant WHERE code = ?1 AND unit = ?2")?
            .query_row(params![key.0, key.1], |row| row.get(0))?;
        self.pollutants.insert(key, id);
        Ok(id)
    }

    fn bucket(&mut self, conn: &Connection, ts: &NaiveDateTime) -> rusqlite::Result<i64> {
        let bucket = TimeBucket::from_timestamp(ts);
        let key = bucket.key();
        if let Some(id) = self.buckets.get(&key) {
            return Ok(*id);
        }
        let (year, month, day, hour) = key;
        conn.prepare_cached(
            "INSERT INTO time_bucket
                (year, month, day, hour, date, start_ts, weekday, month_name, quarter)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (year, month, day, hour) DO NOTHING",
        )?
        .execute(params![
            year,
            month,
            day,
            hour,
            format_date(&bucket.date()),
            format_timestamp(&bucket.start()),
            bucket.weekday_name(),
            bucket.month_name(),
            bucket.quarter(),
        ])?;
        let id = conn
            .prepare_cached(
                "SELECT bucket_id FROM time_bucket
                 WHERE year = ?1 AND month = ?2 AND day = ?3 AND hour = ?4",
            )?
            .query_row(params![year, month, day, hour], |row| row.get(0))?;
        self.buckets.insert(key, id);
        Ok(id)
    }
}

fn insert_measurements(conn: &Connection, readings: &[Reading]) -> anyhow::Result<LoadSummary> {
    let mut ids = DimensionIds::default();
    let mut summary = LoadSummary::default();
    let mut insert = conn.prepare_cached(
        "INSERT INTO measurement (station_id, pollutant_id, bucket_id, value, imputed, observed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (station_id, pollutant_id, bucket_id) DO NOTHING",
    )?;

    for reading in readings {
        let Some(value) = reading.value else {
            summary.skipped += 1;
            continue;
        };
        let station = ids.station(conn, &reading.station)?;
        let pollutant = ids.pollutant(conn, &reading.pollutant, reading.unit.as_deref())?;
        let bucket = ids.bucket(conn, &reading.timestamp)?;
        let changed = insert.execute(params![
            station,
            pollutant,
            bucket,
            value,
            reading.imputed,
            format_timestamp(&reading.timestamp),
        ])?;
        summary.record(changed);
    }
    Ok(summary)
}

fn insert_aqi_records(conn: &Connection, records: &[AqiRecord]) -> anyhow::Result<LoadSummary> {
    let mut ids = DimensionIds::default();
    let mut summary = LoadSummary::default();
    let mut insert = conn.prepare_cached(
        "INSERT INTO aqi_record
            (station_id, bucket_id, index_value, sub_index, category, dominant_pollutant, source)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (station_id, bucket_id) DO NOTHING",
    )?;

    for record in records {
        let station = ids.station(conn, &record.station)?;
        let bucket = ids.bucket(conn, &record.timestamp)?;
        let changed = insert.execute(params![
            station,
            bucket,
            record.index_value,
            record.sub_index,
            record.category.label(),
            record.dominant_pollutant,
            record.source.as_str(),
        ])?;
        summary.record(changed);
    }
    Ok(summary)
}

impl Database {
    /// Load readings as measurement facts.
    ///
    /// Readings whose (station, pollutant, hour) already exists are skipped,
    /// as are readings without a value. On error nothing of the batch is
    /// kept.
    pub fn load_measurements(&self, readings: &[Reading]) -> anyhow::Result<LoadSummary> {
        let mut conn = self.conn.borrow_mut();
        let tx = conn.transaction()?;
        let summary = insert_measurements(&tx, readings)
            .context("Measurement batch failed and was rolled back")?;
        tx.commit()?;
        log::info!(
            "loader: inserted {} measurements, skipped {} existing",
            summary.inserted,
            summary.skipped
        );
        Ok(summary)
    }

    /// Load AQI records, one per (station, hour).
    pub fn load_aqi_records(&self, records: &[AqiRecord]) -> anyhow::Result<LoadSummary> {
        let mut conn = self.conn.borrow_mut();
        let tx = conn.transaction()?;
        let summary =
            insert_aqi_records(&tx, records).context("AQI batch failed and was rolled back")?;
        tx.commit()?;
        log::info!(
            "loader: inserted {} AQI records, skipped {} existing",
            summary.inserted,
            summary.skipped
        );
        Ok(summary)
    }

    /// Load readings and the AQI records derived from them in one
    /// transaction. Either both land or neither does.
    pub fn load_batch(
        &self,
        readings: &[Reading],
        records: &[AqiRecord],
    ) -> anyhow::Result<BatchSummary> {
        let mut conn = self.conn.borrow_mut();
        let tx = conn.transaction()?;
        let summary = insert_measurements(&tx, readings)
            .and_then(|measurements| {
                Ok(BatchSummary {
                    measurements,
                    aqi: insert_aqi_records(&tx, records)?,
                })
            })
            .context("Load batch failed and was rolled back")?;
        tx.commit()?;
        log::info!(
            "loader: inserted {} measurements ({} skipped) and {} AQI records ({} skipped)",
            summary.measurements.inserted,
            summary.measurements.skipped,
            summary.aqi.inserted,
            summary.aqi.skipped
        );
        Ok(summary)
    }

    /// Insert or replace reference limits. Returns the number written.
    pub fn seed_reference_limits(&self, limits: &[ReferenceLimit]) -> anyhow::Result<usize> {
        let mut conn = self.conn.borrow_mut();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO reference_limit (pollutant, authority, period, value, unit)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for limit in limits {
                stmt.execute(params![
                    limit.pollutant,
                    limit.authority,
                    limit.period,
                    limit.value,
                    limit.unit
                ])?;
            }
        }
        tx.commit()?;
        log::info!("loader: seeded {} reference limits", limits.len());
        Ok(limits.len())
    }
}
