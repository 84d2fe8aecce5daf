//! The API extraction cycle: freshness check, extract, reshape, transform,
//! load, AQI.
//!
//! Sources are processed one after the other. A failing source is logged
//! and recorded in the run log with status `error`; its siblings still run.

use crate::config::{Config, EtlOptions};
use crate::incremental::{check_freshness, Freshness};
use aq_core::api::ApiClient;
use aq_core::source::ApiSource;
use aq_data::aqi::{compute_all, ComputationSource};
use aq_data::reshape::normalize;
use aq_data::transform::transform;
use aq_db::run_log::{RunLogEntry, RunStatus};
use aq_db::{BatchSummary, Database, LoadSummary};
use chrono::Local;
use log::{error, info};
use std::time::Instant;

/// Result of one source that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceOutcome {
    pub status: RunStatus,
    pub measurements: LoadSummary,
    pub aqi: LoadSummary,
    pub message: String,
}

/// Extract, transform and load one source.
pub async fn process_source(
    db: &Database,
    client: &ApiClient,
    source: &ApiSource,
    options: &EtlOptions,
) -> anyhow::Result<SourceOutcome> {
    let since = match check_freshness(db, client, source).await? {
        Freshness::NoNewData => {
            return Ok(SourceOutcome {
                status: RunStatus::NoNewData,
                measurements: LoadSummary::default(),
                aqi: LoadSummary::default(),
                message: format!("No data newer than the warehouse for {}", source.station),
            })
        }
        Freshness::Fetch { since } => since,
    };

    let table = client
        .fetch_table(&source.resource_id, options.limit, since)
        .await?;
    let normalized = normalize(&table, &source.station)?;
    let transformed = transform(normalized.readings, &options.imputation_policy());

    let records = compute_all(&transformed.readings, ComputationSource::Automatic);
    let BatchSummary { measurements, aqi } = db.load_batch(&transformed.readings, &records)?;

    Ok(SourceOutcome {
        status: RunStatus::Success,
        measurements,
        aqi,
        message: format!(
            "{} rows fetched, {} unparseable, {} imputed, {} AQI records inserted",
            table.len(),
            normalized.dropped_rows,
            transformed.summary.imputed,
            aqi.inserted
        ),
    })
}

/// Run every source and record one run-log row per source.
pub async fn run_sources(
    db: &Database,
    client: &ApiClient,
    sources: &[ApiSource],
    options: &EtlOptions,
) -> Vec<RunLogEntry> {
    let mut entries = Vec::with_capacity(sources.len());

    for source in sources {
        info!("Starting ETL for {} ({})", source.station, source.resource_id);
        let started = Instant::now();
        let result = process_source(db, client, source, options).await;
        let duration_secs = (started.elapsed().as_secs_f64() * 100.0).round() / 100.0;

        let entry = match result {
            Ok(outcome) => {
                info!("{}: {}", source.station, outcome.message);
                RunLogEntry {
                    source: source.station.clone(),
                    inserted: outcome.measurements.inserted,
                    skipped: outcome.measurements.skipped,
                    duration_secs,
                    status: outcome.status,
                    message: outcome.message,
                    run_at: Local::now().naive_local(),
                }
            }
            Err(e) => {
                error!("ETL failed for {}: {:#}", source.station, e);
                RunLogEntry {
                    source: source.station.clone(),
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
            error!("Could not record run of {}: {:#}", source.station, e);
        }
        entries.push(entry);
    }
    entries
}

/// `run-etl`: the full cycle over every configured source.
pub async fn run_etl(config: &Config, options: &EtlOptions) -> anyhow::Result<()> {
    let db = config.open_database()?;
    let sources = options.load_sources()?;
    let client = ApiClient::new(&options.api_url, options.retry_policy())?;

    info!("=== ETL start: {} sources ===", sources.len());
    let entries = run_sources(&db, &client, &sources, options).await;

    let failed = entries
        .iter()
        .filter(|e| e.status == RunStatus::Error)
        .count();
    let inserted: usize = entries.iter().map(|e| e.inserted).sum();
    info!(
        "=== ETL end: {} sources, {} failed, {} measurements inserted ===",
        entries.len(),
        failed,
        inserted
    );
    Ok(())
}
