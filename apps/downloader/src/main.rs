//! `download-data` - fetch historical bars for the watch-list and save them
//! as CSV.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use quantpm_core::{ConfigSource, Settings};
use quantpm_downloader::{DownloadPlan, Downloader, Preset, DEFAULT_OUTPUT_DIR};
use quantpm_market_data::{Interval, ProviderAggregator};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "download-data",
    about = "Download historical market data for the configured watch-list"
)]
struct Cli {
    /// Canned window. Defaults to year-daily when no custom period is given.
    #[arg(long, value_enum, conflicts_with_all = ["days", "interval"])]
    preset: Option<Preset>,

    /// Custom period length in days.
    #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
    days: Option<i64>,

    /// Bar interval for a custom period (1d, 1wk, 1mo, 1m, 5m, ...).
    #[arg(long, requires = "days")]
    interval: Option<Interval>,

    /// Comma-separated symbols. Defaults to the watch-list.
    #[arg(long, value_delimiter = ',')]
    symbols: Vec<String>,

    /// Directory the CSV files are written to.
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Pause between symbols, in milliseconds.
    #[arg(long, default_value_t = 500)]
    delay_ms: u64,
}

impl Cli {
    fn plan(&self) -> DownloadPlan {
        match (self.preset, self.days) {
            (Some(preset), _) => preset.plan(),
            (None, Some(days)) => DownloadPlan::new(days, self.interval.unwrap_or_default()),
            (None, None) => Preset::YearDaily.plan(),
        }
    }

    fn symbols(&self, config: &ConfigSource) -> Vec<String> {
        let explicit: Vec<String> = self
            .symbols
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if explicit.is_empty() {
            config.watchlist()
        } else {
            explicit
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::from_env()?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ConfigSource::with_settings(settings)?;
    let symbols = cli.symbols(&config);
    if symbols.is_empty() {
        bail!(
            "no symbols given and the watch-list in {} is empty",
            config.settings.config_dir.display()
        );
    }

    println!("{}", "=".repeat(60));
    println!("Historical Data Downloader");
    println!("{}", "=".repeat(60));
    println!("Symbols: {}", symbols.join(", "));

    let aggregator = ProviderAggregator::from_config(&config.settings.aggregator_config())?;
    let downloader = Downloader::new(&aggregator, &cli.output_dir)
        .with_delay(Duration::from_millis(cli.delay_ms));

    let report = downloader
        .run(&symbols, cli.plan(), &mut io::stdout())
        .await?;

    println!(
        "Data saved to: {}",
        downloader.output_dir().canonicalize()?.display()
    );
    if !report.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}
