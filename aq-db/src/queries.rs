//! Typed read queries for the dashboard and the CLI.
//!
//! Every query is read-only. Empty results are returned as empty vectors;
//! callers decide how to present them.

use crate::models::{AqiPoint, MeasurementPoint, PollutantInfo, StationInfo};
use crate::Database;
use aq_data::breakpoints::normalize_code;
use aq_data::limits::{fallback_limits, ReferenceLimit};
use aq_utils::dates::{parse_stored_timestamp, DateRange};
use rusqlite::{params, OptionalExtension, Row};

fn pollutant_from_row(row: &Row<'_>) -> rusqlite::Result<PollutantInfo> {
    let unit: String = row.get(2)?;
    Ok(PollutantInfo {
        pollutant_id: row.get(0)?,
        code: row.get(1)?,
        unit: Some(unit).filter(|u| !u.is_empty()),
    })
}

fn station_from_row(row: &Row<'_>) -> rusqlite::Result<StationInfo> {
    Ok(StationInfo {
        station_id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        active: row.get(3)?,
    })
}

fn range_bounds(range: Option<&DateRange>) -> (Option<String>, Option<String>) {
    range.map(DateRange::bounds).unwrap_or_default()
}

impl Database {
    // ───────────────────── Dimensions ─────────────────────

    pub fn query_stations(&self) -> anyhow::Result<Vec<StationInfo>> {
        let conn = self.conn.borrow();
        let mut stmt = conn.prepare(
            "SELECT station_id, name, code, active FROM station ORDER BY name",
        )?;
        let rows = stmt
            .query_map([], station_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("query: query_stations returned {} records", rows.len());
        Ok(rows)
    }

    /// Find a station by name or code, case-insensitively.
    pub fn find_station(&self, name: &str) -> anyhow::Result<Option<StationInfo>> {
        let conn = self.conn.borrow();
        let station = conn
            .query_row(
                "SELECT station_id, name, code, active FROM station
                 WHERE name = ?1 COLLATE NOCASE OR code = upper(?1)
                 ORDER BY station_id LIMIT 1",
                [name.trim()],
                station_from_row,
            )
            .optional()?;
        Ok(station)
    }

    pub fn query_pollutants(&self) -> anyhow::Result<Vec<PollutantInfo>> {
        let conn = self.conn.borrow();
        let mut stmt =
            conn.prepare("SELECT pollutant_id, code, unit FROM pollutant ORDER BY code, unit")?;
        let rows = stmt
            .query_map([], pollutant_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("query: query_pollutants returned {} records", rows.len());
        Ok(rows)
    }

    /// Pollutants with at least one measurement at a station.
    pub fn query_pollutants_for_station(&self, station_id: i64) -> anyhow::Result<Vec<PollutantInfo>> {
        let conn = self.conn.borrow();
        let mut stmt = conn.prepare(
            "SELECT p.pollutant_id, p.code, p.unit
             FROM pollutant p
             WHERE EXISTS (
                 SELECT 1 FROM measurement m
                 WHERE m.pollutant_id = p.pollutant_id AND m.station_id = ?1
             )
             ORDER BY p.code, p.unit",
        )?;
        let rows = stmt
            .query_map(params![station_id], pollutant_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!(
            "query: query_pollutants_for_station({}) returned {} records",
            station_id,
            rows.len()
        );
        Ok(rows)
    }

    /// Find a pollutant by code. Codes are compared in normalized form, so
    /// "pm2,5" finds "PM2.5". With several units the first id wins.
    pub fn find_pollutant(&self, code: &str) -> anyhow::Result<Option<PollutantInfo>> {
        let wanted = normalize_code(code);
        Ok(self
            .query_pollutants()?
            .into_iter()
            .filter(|p| normalize_code(&p.code) == wanted)
            .min_by_key(|p| p.pollutant_id))
    }

    // ───────────────────── Facts ─────────────────────

    /// Hourly measurement series of one pollutant at one station.
    pub fn query_measurements(
        &self,
        station_id: i64,
        pollutant_id: i64,
        range: Option<&DateRange>,
    ) -> anyhow::Result<Vec<MeasurementPoint>> {
        let (start, end) = range_bounds(range);
        let conn = self.conn.borrow();
        let mut stmt = conn.prepare(
            "SELECT tb.start_ts, m.value, m.imputed
             FROM measurement m
             JOIN time_bucket tb ON tb.bucket_id = m.bucket_id
             WHERE m.station_id = ?1 AND m.pollutant_id = ?2
               AND (?3 IS NULL OR tb.date >= ?3)
               AND (?4 IS NULL OR tb.date <= ?4)
             ORDER BY tb.start_ts",
        )?;
        let rows = stmt
            .query_map(params![station_id, pollutant_id, start, end], |row| {
                Ok(MeasurementPoint {
                    timestamp: row.get(0)?,
                    value: row.get(1)?,
                    imputed: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        log::info!("query: query_measurements returned {} records", rows.len());
        Ok(rows)
    }

    /// Hourly AQI series of one station.
    pub fn query_aqi(&self, station_id: i64, range: Option<&DateRange>) -> anyhow::Result<Vec<AqiPoint>> {
        let (start, end) = range_bounds(range);
        let conn = self.conn.borrow();
        let mut stmt = conn.prepare(
            "SELECT tb.start_ts, a.index_value, a.sub_index, a.category,
                    a.dominant_pollutant, a.source
             FROM aqi_record a
             JOIN time_bucket tb ON tb.bucket_id = a.bucket_id
             WHERE a.station_id = ?1
               AND (?2 IS NULL OR tb.date >= ?2)
               AND (?3 IS NULL OR tb.date <= ?3)
             ORDER BY tb.start_ts",
        )?;
        let rows = stmt
            .query_map(params![station_id, start, end], |row| {
                Ok(AqiPoint {
                    timestamp: row.get(0)?,
                    index_value: row.get(1)?,
                    sub_index: row.get(2)?,
                    category: row.get(3)?,
                    dominant_pollutant: row.get(4)?,
                    source: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        log::info!("query: query_aqi returned {} records", rows.len());
        Ok(rows)
    }

    /// Exact time of the freshest measurement at the named station.
    pub fn latest_measurement_time(
        &self,
        station_name: &str,
    ) -> anyhow::Result<Option<chrono::NaiveDateTime>> {
        let conn = self.conn.borrow();
        let latest: Option<String> = conn.query_row(
            "SELECT MAX(m.observed_at)
             FROM measurement m
             JOIN station s ON s.station_id = m.station_id
             WHERE s.name = ?1",
            [station_name],
            |row| row.get(0),
        )?;
        latest.as_deref().map(parse_stored_timestamp).transpose()
    }

    // ───────────────────── Reference limits ─────────────────────

    /// Limits stored for a pollutant, or the compiled-in ones when the
    /// table has none.
    pub fn query_reference_limits(&self, pollutant_code: &str) -> anyhow::Result<Vec<ReferenceLimit>> {
        let wanted = normalize_code(pollutant_code);
        let conn = self.conn.borrow();
        let mut stmt = conn.prepare(
            "SELECT pollutant, authority, period, value, unit
             FROM reference_limit
             ORDER BY authority, period",
        )?;
        let stored = stmt
            .query_map([], |row| {
                Ok(ReferenceLimit {
                    pollutant: row.get(0)?,
                    authority: row.get(1)?,
                    period: row.get(2)?,
                    value: row.get(3)?,
                    unit: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|l| normalize_code(&l.pollutant) == wanted)
            .collect::<Vec<_>>();

        if stored.is_empty() {
            log::debug!("query: no stored limits for {}, using fallback", pollutant_code);
            return Ok(fallback_limits(pollutant_code));
        }
        Ok(stored)
    }
}
