//! AQ CLI - Command line tool for the air quality warehouse.

use clap::Parser;

mod logging;

#[derive(Parser)]
#[command(
    name = "aq-cli",
    version,
    about = "Air quality ETL and warehouse toolkit"
)]
struct Cli {
    #[command(flatten)]
    config: aq_cmd::Config,

    #[command(subcommand)]
    command: aq_cmd::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.config.log_dir);
    aq_cmd::run(&cli.config, cli.command).await
}
