//! `load-csv`: manually curated CSV sheets into the warehouse.

use crate::config::Config;
use anyhow::Context;
use aq_data::aqi::{compute_all, ComputationSource};
use aq_data::manual::parse_manual_csv;
use aq_data::transform::deduplicate;
use aq_db::run_log::{RunLogEntry, RunStatus};
use aq_db::{BatchSummary, Database, LoadSummary};
use chrono::Local;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Every `*.csv` file below `dir`, sorted by path.
pub fn discover_csv_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current)
            .with_context(|| format!("Failed to list {}", current.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
            {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Load one sheet. Returns the measurement and AQI load counts.
pub fn load_csv_file(db: &Database, path: &Path) -> anyhow::Result<(LoadSummary, LoadSummary)> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let sheet = parse_manual_csv(&data)?;
    info!(
        "{}: {} {} readings, {} rows dropped",
        path.display(),
        sheet.readings.len(),
        sheet.pollutant,
        sheet.dropped_rows
    );

    let readings = deduplicate(sheet.readings);
    let records = compute_all(&readings, ComputationSource::Manual);
    let BatchSummary { measurements, aqi } = db.load_batch(&readings, &records)?;
    Ok((measurements, aqi))
}

/// Load every sheet below `csv_dir`, one run-log row per file.
pub fn load_csv_dir(db: &Database, csv_dir: &Path) -> anyhow::Result<Vec<RunLogEntry>> {
    let files = discover_csv_files(csv_dir)?;
    info!("Found {} CSV files under {}", files.len(), csv_dir.display());
    if files.is_empty() {
        warn!("No CSV files to load");
    }

    let mut entries = Vec::with_capacity(files.len());
    for path in files {
        let started = Instant::now();
        let result = load_csv_file(db, &path);
        let duration_secs = (started.elapsed().as_secs_f64() * 100.0).round() / 100.0;
        let source = path.display().to_string();

        let entry = match result {
            Ok((measurements, aqi)) => RunLogEntry {
                source,
                inserted: measurements.inserted,
                skipped: measurements.skipped,
                duration_secs,
                status: RunStatus::Success,
                message: format!("{} AQI records inserted", aqi.inserted),
                run_at: Local::now().naive_local(),
            },
            Err(e) => {
                error!("Skipping {}: {:#}", source, e);
                RunLogEntry {
                    source,
                    inserted: 0,
                    skipped: 0,
                    duration_secs,
                    status: RunStatus::Error,
                    message: format!("{:#}", e),
                    run_at: Local::now().naive_local(),
                }
            }
        };
        if let Err(e) = db.record_run(&entry) {
            error!("Could not record run of {}: {:#}", entry.source, e);
        }
        entries.push(entry);
    }
    Ok(entries)
}

pub fn run_load_csv(config: &Config, csv_dir: &Path) -> anyhow::Result<()> {
    let db = config.open_database()?;
    let entries = load_csv_dir(&db, csv_dir)?;
    let inserted: usize = entries.iter().map(|e| e.inserted).sum();
    info!(
        "Manual load complete: {} files, {} measurements inserted",
        entries.len(),
        inserted
    );
    Ok(())
}
