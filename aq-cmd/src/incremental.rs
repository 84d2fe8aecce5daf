//! Incremental extraction - only fetch data newer than what's already in
//! the warehouse.

use aq_core::api::ApiClient;
use aq_core::source::ApiSource;
use aq_db::Database;
use chrono::NaiveDateTime;
use log::info;

/// What an extraction of one source should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The warehouse already holds upstream's freshest record.
    NoNewData,
    /// Fetch records at or after `since`; `None` means the full history.
    Fetch { since: Option<NaiveDateTime> },
}

/// Compare the freshest stored timestamp with upstream's freshest.
pub fn decide(stored: Option<NaiveDateTime>, upstream: Option<NaiveDateTime>) -> Freshness {
    match (stored, upstream) {
        (_, None) => Freshness::NoNewData,
        (Some(stored), Some(upstream)) if stored >= upstream => Freshness::NoNewData,
        (stored, Some(_)) => Freshness::Fetch { since: stored },
    }
}

/// Ask the warehouse and upstream how fresh a source is.
pub async fn check_freshness(
    db: &Database,
    client: &ApiClient,
    source: &ApiSource,
) -> anyhow::Result<Freshness> {
    let stored = db.latest_measurement_time(&source.station)?;
    let upstream = client.latest_timestamp(&source.resource_id).await?;
    let freshness = decide(stored, upstream);
    match (&freshness, stored) {
        (Freshness::NoNewData, _) => info!(
            "{} is up to date (stored {:?}, upstream {:?})",
            source.station, stored, upstream
        ),
        (Freshness::Fetch { .. }, Some(stored)) => {
            info!("{} has data newer than {}", source.station, stored)
        }
        (Freshness::Fetch { .. }, None) => {
            info!("{} is new to the warehouse, fetching full history", source.station)
        }
    }
    Ok(freshness)
}
