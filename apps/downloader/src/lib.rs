//! Bulk historical download.
//!
//! Pulls a historical window for every symbol through the provider chain and
//! writes one CSV per symbol to `<output>/<SYMBOL>_<interval>_historical.csv`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use quantpm_market_data::{Interval, ProviderAggregator, Series};
use tracing::{debug, warn};

pub const DEFAULT_OUTPUT_DIR: &str = "data/raw";
pub const CSV_HEADER: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

const RULE_WIDTH: usize = 60;

/// Canned download windows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// 1 year of daily bars.
    YearDaily,
    /// 3 months of daily bars.
    QuarterDaily,
    /// 1 month of daily bars.
    MonthDaily,
    /// 1 year of weekly bars.
    YearWeekly,
}

impl Preset {
    pub fn plan(self) -> DownloadPlan {
        match self {
            Self::YearDaily => DownloadPlan::new(365, Interval::Daily),
            Self::QuarterDaily => DownloadPlan::new(90, Interval::Daily),
            Self::MonthDaily => DownloadPlan::new(30, Interval::Daily),
            Self::YearWeekly => DownloadPlan::new(365, Interval::Weekly),
        }
    }
}

/// How far back to go and at which bar width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DownloadPlan {
    pub days: i64,
    pub interval: Interval,
}

impl DownloadPlan {
    pub fn new(days: i64, interval: Interval) -> Self {
        Self { days, interval }
    }

    /// `[end - days, end]`.
    pub fn window(&self, end: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (end - chrono::Duration::days(self.days), end)
    }
}

/// File a symbol's series is written to.
pub fn output_path(dir: &Path, symbol: &str, interval: Interval) -> PathBuf {
    dir.join(format!("{}_{}_historical.csv", symbol, interval))
}

/// Write a series as CSV, returning the number of rows.
pub fn write_series_csv(path: &Path, series: &Series) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record(CSV_HEADER)?;
    for bar in series.bars() {
        writer.write_record([
            bar.timestamp.to_rfc3339(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ])?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(series.len())
}

/// A symbol that was written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedFile {
    pub symbol: String,
    pub path: PathBuf,
    pub rows: usize,
}

/// Outcome of one download run.
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub total: usize,
    pub saved: Vec<SavedFile>,
    pub failed: Vec<String>,
}

impl DownloadReport {
    pub fn success_count(&self) -> usize {
        self.saved.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Downloader<'a> {
    aggregator: &'a ProviderAggregator,
    output_dir: PathBuf,
    delay: Duration,
}

impl<'a> Downloader<'a> {
    pub fn new(aggregator: &'a ProviderAggregator, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            aggregator,
            output_dir: output_dir.into(),
            delay: Duration::ZERO,
        }
    }

    /// Pause between consecutive symbols.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Download every symbol in order, printing progress to `out`.
    ///
    /// A symbol with no data or an unwritable file goes on the failed list;
    /// the run continues with the next one.
    pub async fn run<W: Write>(
        &self,
        symbols: &[String],
        plan: DownloadPlan,
        out: &mut W,
    ) -> Result<DownloadReport> {
        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("failed to create {}", self.output_dir.display()))?;

        let (start, end) = plan.window(Utc::now());
        let total = symbols.len();
        let mut report = DownloadReport {
            total,
            ..DownloadReport::default()
        };

        writeln!(out, "Downloading historical data for {} symbols", total)?;
        writeln!(
            out,
            "Period: {} to {}",
            start.date_naive(),
            end.date_naive()
        )?;
        writeln!(out, "Interval: {}", plan.interval)?;
        writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;

        for (i, symbol) in symbols.iter().enumerate() {
            write!(out, "[{}/{}] Downloading {}... ", i + 1, total, symbol)?;

            let series = self
                .aggregator
                .get_historical(symbol, start, end, plan.interval)
                .await;

            if series.is_empty() {
                warn!("No data received for {}", symbol);
                writeln!(out, "no data received")?;
                report.failed.push(symbol.clone());
            } else {
                let path = output_path(&self.output_dir, symbol, plan.interval);
                match write_series_csv(&path, &series) {
                    Ok(rows) => {
                        debug!("Wrote {} rows for {} to {}", rows, symbol, path.display());
                        writeln!(out, "saved {} rows to {}", rows, path.display())?;
                        report.saved.push(SavedFile {
                            symbol: symbol.clone(),
                            path,
                            rows,
                        });
                    }
                    Err(e) => {
                        warn!("Failed to save {}: {:#}", symbol, e);
                        writeln!(out, "error: {:#}", e)?;
                        report.failed.push(symbol.clone());
                    }
                }
            }

            if i + 1 < total && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;
        writeln!(
            out,
            "Successfully downloaded: {}/{}",
            report.success_count(),
            total
        )?;
        if !report.failed.is_empty() {
            writeln!(out, "Failed symbols: {}", report.failed.join(", "))?;
        }
        Ok(report)
    }
}
