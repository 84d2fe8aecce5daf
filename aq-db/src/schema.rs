//! SQL schema of the warehouse.
//!
//! A star schema: `measurement` and `aqi_record` facts keyed on the
//! `station`, `pollutant` and `time_bucket` dimensions, plus the ETL audit
//! log and the reference limits shown on charts. The schema is applied as a
//! single batch every time the database is opened.

/// Returns the full SQL schema as a single batch string.
pub fn create_schema() -> &'static str {
    r#"
    CREATE TABLE IF NOT EXISTS station (
        station_id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        code TEXT NOT NULL,
        active INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS pollutant (
        pollutant_id INTEGER PRIMARY KEY AUTOINCREMENT,
        code TEXT NOT NULL,
        unit TEXT NOT NULL DEFAULT '',
        UNIQUE (code, unit)
    );

    CREATE TABLE IF NOT EXISTS time_bucket (
        bucket_id INTEGER PRIMARY KEY AUTOINCREMENT,
        year INTEGER NOT NULL,
        month INTEGER NOT NULL,
        day INTEGER NOT NULL,
        hour INTEGER NOT NULL,
        date TEXT NOT NULL,
        start_ts TEXT NOT NULL,
        weekday TEXT NOT NULL,
        month_name TEXT NOT NULL,
        quarter INTEGER NOT NULL,
        UNIQUE (year, month, day, hour)
    );
    CREATE INDEX IF NOT EXISTS idx_bucket_date ON time_bucket(date);

    CREATE TABLE IF NOT EXISTS measurement (
        measurement_id INTEGER PRIMARY KEY AUTOINCREMENT,
        station_id INTEGER NOT NULL REFERENCES station(station_id),
        pollutant_id INTEGER NOT NULL REFERENCES pollutant(pollutant_id),
        bucket_id INTEGER NOT NULL REFERENCES time_bucket(bucket_id),
        value REAL NOT NULL,
        imputed INTEGER NOT NULL DEFAULT 0,
        -- exact upstream time, "YYYY-MM-DD HH:MM:SS"
        observed_at TEXT NOT NULL,
        UNIQUE (station_id, pollutant_id, bucket_id)
    );
    CREATE INDEX IF NOT EXISTS idx_measurement_series ON measurement(station_id, pollutant_id);
    CREATE INDEX IF NOT EXISTS idx_measurement_bucket ON measurement(bucket_id);

    CREATE TABLE IF NOT EXISTS aqi_record (
        aqi_id INTEGER PRIMARY KEY AUTOINCREMENT,
        station_id INTEGER NOT NULL REFERENCES station(station_id),
        bucket_id INTEGER NOT NULL REFERENCES time_bucket(bucket_id),
        index_value INTEGER NOT NULL CHECK (index_value BETWEEN 0 AND 500),
        sub_index REAL NOT NULL,
        category TEXT NOT NULL,
        dominant_pollutant TEXT NOT NULL,
        source TEXT NOT NULL,
        UNIQUE (station_id, bucket_id)
    );
    CREATE INDEX IF NOT EXISTS idx_aqi_station ON aqi_record(station_id);

    CREATE TABLE IF NOT EXISTS etl_run_log (
        run_id INTEGER PRIMARY KEY AUTOINCREMENT,
        source TEXT NOT NULL,
        inserted INTEGER NOT NULL,
        skipped INTEGER NOT NULL,
        duration_secs REAL NOT NULL,
        status TEXT NOT NULL,
        message TEXT NOT NULL DEFAULT '',
        run_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_run_log_run_at ON etl_run_log(run_at);

    CREATE TABLE IF NOT EXISTS reference_limit (
        pollutant TEXT NOT NULL,
        authority TEXT NOT NULL,
        period TEXT NOT NULL,
        value REAL NOT NULL,
        unit TEXT NOT NULL,
        PRIMARY KEY (pollutant, authority, period)
    );
    "#
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn count_objects(conn: &Connection, kind: &str, name: &str) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
            [kind, name],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();

        for table in [
            "station",
            "pollutant",
            "time_bucket",
            "measurement",
            "aqi_record",
            "etl_run_log",
            "reference_limit",
        ] {
            assert_eq!(count_objects(&conn, "table", table), 1, "Table '{}' should exist", table);
        }
    }

    #[test]
    fn schema_creates_indexes() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();

        for idx in [
            "idx_bucket_date",
            "idx_measurement_series",
            "idx_measurement_bucket",
            "idx_aqi_station",
            "idx_run_log_run_at",
        ] {
            assert_eq!(count_objects(&conn, "index", idx), 1, "Index '{}' should exist", idx);
        }
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();
        conn.execute_batch(create_schema())
            .expect("Applying schema twice should succeed due to IF NOT EXISTS");
    }

    #[test]
    fn aqi_index_is_range_checked() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();
        conn.execute_batch(
            "INSERT INTO station (name, code) VALUES ('Pance', 'PANCE');
             INSERT INTO time_bucket (year, month, day, hour, date, start_ts, weekday, month_name, quarter)
             VALUES (2024, 1, 1, 0, '2024-01-01', '2024-01-01 00:00:00', 'Monday', 'January', 1);",
        )
        .unwrap();
        let result = conn.execute(
            "INSERT INTO aqi_record (station_id, bucket_id, index_value, sub_index, category, dominant_pollutant, source)
             VALUES (1, 1, 501, 501.0, 'Hazardous', 'PM10', 'automatic')",
            [],
        );
        assert!(result.is_err());
    }
}
