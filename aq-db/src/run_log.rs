//! Durable audit trail of ETL runs, one row per source and run.

use crate::Database;
use aq_utils::dates::{format_timestamp, parse_stored_timestamp};
use chrono::NaiveDateTime;
use rusqlite::params;
use serde::Serialize;
use std::fmt;

/// Terminal outcome of one source in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// The warehouse already holds upstream's freshest record.
    NoNewData,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::NoNewData => "no_new_data",
            RunStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<RunStatus> {
        match s {
            "success" => Some(RunStatus::Success),
            "no_new_data" => Some(RunStatus::NoNewData),
            "error" => Some(RunStatus::Error),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunLogEntry {
    /// Station name, or the file path of a manual load.
    pub source: String,
    pub inserted: usize,
    pub skipped: usize,
    pub duration_secs: f64,
    pub status: RunStatus,
    pub message: String,
    pub run_at: NaiveDateTime,
}

impl Database {
    /// Append one run to the log. Returns the new row id.
    pub fn record_run(&self, entry: &RunLogEntry) -> anyhow::Result<i64> {
        let conn = self.conn.borrow();
        conn.execute(
            "INSERT INTO etl_run_log (source, inserted, skipped, duration_secs, status, message, run_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.source,
                entry.inserted as i64,
                entry.skipped as i64,
                entry.duration_secs,
                entry.status.as_str(),
                entry.message,
                format_timestamp(&entry.run_at),
            ],
        )?;
        log::info!(
            "run log: {} {} (inserted {}, skipped {})",
            entry.source,
            entry.status,
            entry.inserted,
            entry.skipped
        );
        Ok(conn.last_insert_rowid())
    }

    /// Most recent runs first.
    pub fn query_run_log(&self, limit: usize) -> anyhow::Result<Vec<RunLogEntry>> {
        let conn = self.conn.borrow();
        let mut stmt = conn.prepare(
            "SELECT source, inserted, skipped, duration_secs, status, message, run_at
             FROM etl_run_log
             ORDER BY run_at DESC, run_id DESC
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(source, inserted, skipped, duration_secs, status, message, run_at)| {
                Ok(RunLogEntry {
                    source,
                    inserted: inserted.max(0) as usize,
                    skipped: skipped.max(0) as usize,
                    duration_secs,
                    status: RunStatus::parse(&status)
                        .ok_or_else(|| anyhow::anyhow!("Unknown run status {:?}", status))?,
                    message,
                    run_at: parse_stored_timestamp(&run_at)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(source: &str, minute: u32, status: RunStatus) -> RunLogEntry {
        RunLogEntry {
            source: source.to_string(),
            inserted: 10,
            skipped: 2,
            duration_secs: 1.5,
            status,
            message: String::new(),
            run_at: NaiveDate::from_ymd_opt(2024, 7, 1)
                .unwrap()
                .and_hms_opt(3, minute, 0)
                .unwrap(),
        }
    }

    #[test]
    fn runs_round_trip_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.record_run(&entry("pance", 0, RunStatus::Success)).unwrap();
        db.record_run(&entry("flora", 5, RunStatus::Error)).unwrap();
        db.record_run(&entry("ermita", 2, RunStatus::NoNewData)).unwrap();

        let log = db.query_run_log(10).unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].source, "flora");
        assert_eq!(log[0].status, RunStatus::Error);
        assert_eq!(log[2], entry("pance", 0, RunStatus::Success));

        assert_eq!(db.query_run_log(1).unwrap().len(), 1);
    }

    #[test]
    fn status_strings() {
        for status in [RunStatus::Success, RunStatus::NoNewData, RunStatus::Error] {
            assert_eq!(RunStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RunStatus::parse("Error"), None);
    }
}
