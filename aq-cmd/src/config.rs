//! Runtime configuration shared by the commands.
//!
//! Every setting is a command-line flag with an environment fallback.

use anyhow::Context;
use aq_core::api::{RetryPolicy, DEFAULT_API_URL, DEFAULT_LIMIT};
use aq_core::source::ApiSource;
use aq_data::imputation::{ImputationPolicy, DEFAULT_MAX_GAP_HOURS};
use aq_db::Database;
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DATABASE: &str = "data/air_quality.db";
pub const DEFAULT_LOG_DIR: &str = "data/logs";
pub const DEFAULT_CSV_DIR: &str = "data/manual_csv";

/// Settings every command needs.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Path of the SQLite warehouse
    #[arg(long, env = "AQ_DATABASE", default_value = DEFAULT_DATABASE, global = true)]
    pub database: PathBuf,

    /// Directory of the daily process log files
    #[arg(long, env = "AQ_LOG_DIR", default_value = DEFAULT_LOG_DIR, global = true)]
    pub log_dir: PathBuf,
}

impl Config {
    pub fn open_database(&self) -> anyhow::Result<Database> {
        Database::open(&self.database)
    }
}

/// Settings of an API extraction run.
#[derive(Args, Debug, Clone)]
pub struct EtlOptions {
    /// Datastore search endpoint
    #[arg(long, env = "AQ_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// CSV file with `resource_id,station` rows (defaults to the built-in stations)
    #[arg(long, env = "AQ_SOURCES")]
    pub sources: Option<PathBuf>,

    /// Records requested per source
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,

    /// Longest distance in hours to a real neighbor for gap filling
    #[arg(long, default_value_t = DEFAULT_MAX_GAP_HOURS)]
    pub max_gap_hours: i64,

    /// Attempts per request before a source is marked as failed
    #[arg(long, default_value_t = 3)]
    pub max_attempts: u32,

    /// Delay before the first retry, doubled after each further failure
    #[arg(long, default_value_t = 1000)]
    pub initial_backoff_ms: u64,
}

impl Default for EtlOptions {
    fn default() -> Self {
        EtlOptions {
            api_url: DEFAULT_API_URL.to_string(),
            sources: None,
            limit: DEFAULT_LIMIT,
            max_gap_hours: DEFAULT_MAX_GAP_HOURS,
            max_attempts: 3,
            initial_backoff_ms: 1000,
        }
    }
}

impl EtlOptions {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
        }
    }

    pub fn imputation_policy(&self) -> ImputationPolicy {
        ImputationPolicy::from_hours(self.max_gap_hours)
    }

    /// The configured sources, or the built-in registry.
    pub fn load_sources(&self) -> anyhow::Result<Vec<ApiSource>> {
        match &self.sources {
            Some(path) => ApiSource::load_source_file(path)
                .with_context(|| format!("Failed to read sources from {}", path.display())),
            None => Ok(ApiSource::default_sources()?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_use_builtin_sources() {
        let options = EtlOptions::default();
        assert_eq!(options.load_sources().unwrap().len(), 4);
        assert_eq!(options.retry_policy().max_attempts, 3);
        assert_eq!(
            options.imputation_policy().max_gap,
            chrono::TimeDelta::hours(120)
        );
    }

    #[test]
    fn sources_file_overrides_registry() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "resource_id,station\nabc-123,Compartir").unwrap();
        let options = EtlOptions {
            sources: Some(file.path().to_path_buf()),
            ..EtlOptions::default()
        };
        let sources = options.load_sources().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].station, "Compartir");
    }
}
