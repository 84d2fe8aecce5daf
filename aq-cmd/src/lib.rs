//! Command implementations for the AQ CLI.
//!
//! Provides subcommands for initializing the warehouse, running the API
//! ETL cycle, loading manual CSV sheets and reading the stored data back.

use clap::Subcommand;
use std::path::PathBuf;

pub mod config;
pub mod etl;
pub mod incremental;
pub mod manual;
pub mod query;

pub use config::{Config, EtlOptions};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the warehouse schema (idempotent)
    InitDb {
        /// Also store the compiled-in regulatory reference limits
        #[arg(long)]
        seed_limits: bool,
    },

    /// Fetch new data for every configured station and load it
    RunEtl {
        #[command(flatten)]
        options: EtlOptions,
    },

    /// Load manually curated CSV sheets from a directory tree
    LoadCsv {
        /// Directory searched recursively for *.csv files
        #[arg(long, env = "AQ_CSV_DIR", default_value = config::DEFAULT_CSV_DIR)]
        csv_dir: PathBuf,
    },

    /// Print a measurement series as CSV
    Measurements {
        /// Station name or code
        #[arg(short = 's', long)]
        station: String,

        /// Pollutant code, e.g. PM2.5
        #[arg(short = 'p', long)]
        pollutant: String,

        /// First day, YYYY-MM-DD or YYYYMMDD
        #[arg(long)]
        start: Option<String>,

        /// Last day, YYYY-MM-DD or YYYYMMDD
        #[arg(long)]
        end: Option<String>,
    },

    /// Print an AQI series as CSV
    Aqi {
        #[arg(short = 's', long)]
        station: String,

        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,
    },

    /// Print per-pollutant KPIs for a station
    Summary {
        #[arg(short = 's', long)]
        station: String,

        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,
    },

    /// Print the most recent ETL runs
    RunLog {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

pub async fn run(config: &Config, command: Command) -> anyhow::Result<()> {
    match command {
        Command::InitDb { seed_limits } => query::run_init_db(config, seed_limits),
        Command::RunEtl { options } => etl::run_etl(config, &options).await,
        Command::LoadCsv { csv_dir } => manual::run_load_csv(config, &csv_dir),
        Command::Measurements {
            station,
            pollutant,
            start,
            end,
        } => query::run_measurements(config, &station, &pollutant, start.as_deref(), end.as_deref()),
        Command::Aqi { station, start, end } => {
            query::run_aqi(config, &station, start.as_deref(), end.as_deref())
        }
        Command::Summary { station, start, end } => {
            query::run_summary(config, &station, start.as_deref(), end.as_deref())
        }
        Command::RunLog { limit } => query::run_run_log(config, limit),
    }
}
