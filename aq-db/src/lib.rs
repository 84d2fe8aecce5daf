//! SQLite warehouse for air quality data.
//!
//! This crate owns the persisted side of the pipeline: a star schema of
//! stations, pollutants and hourly time buckets, the measurement and AQI
//! fact tables, the ETL run log, and the typed queries the dashboard and
//! the CLI read from.
//!
//! # Architecture
//!
//! - One [`Database`] handle is opened at process start and passed to every
//!   component that needs persistence. There is no global connection.
//! - `Rc<RefCell<Connection>>` keeps the handle cheaply cloneable on a
//!   single thread; ETL runs against one warehouse must be serialized by
//!   the caller.
//! - Loads run inside one transaction per batch: a failure rolls back the
//!   whole batch.
//!
//! # Usage
//!
//! ```rust
//! use aq_core::reading::Reading;
//! use aq_db::Database;
//! use chrono::NaiveDate;
//!
//! let db = Database::open_in_memory().unwrap();
//! let ts = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! let batch = vec![Reading::observed("Pance", ts, "PM10", Some("ug/m3"), 30.0)];
//!
//! let first = db.load_measurements(&batch).unwrap();
//! let second = db.load_measurements(&batch).unwrap();
//! assert_eq!((first.inserted, second.inserted, second.skipped), (1, 0, 1));
//! ```

pub mod cache;
mod loader;
pub mod models;
mod queries;
pub mod run_log;
pub mod schema;

pub use loader::{BatchSummary, LoadSummary};

use anyhow::Context;
use rusqlite::Connection;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

/// Handle to the warehouse.
#[derive(Clone)]
pub struct Database {
    conn: Rc<RefCell<Connection>>,
}

impl Database {
    /// Open (or create) the warehouse file and apply the schema.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        log::info!("Opened warehouse at {}", path.display());
        Self::from_connection(conn)
    }

    /// Create an empty in-memory warehouse with the full schema applied.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(schema::create_schema())
            .context("Failed to apply warehouse schema")?;
        Ok(Self {
            conn: Rc::new(RefCell::new(conn)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_creates_successfully() {
        assert!(Database::open_in_memory().is_ok());
    }

    #[test]
    fn database_is_cloneable() {
        let db = Database::open_in_memory().unwrap();
        let db2 = db.clone();
        db.conn
            .borrow()
            .execute("INSERT INTO station (name, code) VALUES ('Pance', 'PANCE')", [])
            .unwrap();
        let stations = db2.query_stations().unwrap();
        assert_eq!(stations.len(), 1, "Clone should see same data via shared Rc");
    }

    #[test]
    fn file_database_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("aq.db");
        {
            let db = Database::open(&path).unwrap();
            db.conn
                .borrow()
                .execute("INSERT INTO station (name, code) VALUES ('Flora', 'FLORA')", [])
                .unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.query_stations().unwrap()[0].name, "Flora");
    }
}
