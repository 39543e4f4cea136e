use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quantpm_downloader::{output_path, DownloadPlan, Downloader, Preset};
use quantpm_market_data::{
    Bar, Interval, MarketDataError, MarketDataProvider, ProviderAggregator, Quote, RateLimit,
    Series,
};
use rust_decimal_macros::dec;

/// Serves three daily bars for any symbol except `MISSING`.
struct FixtureProvider;

#[async_trait]
impl MarketDataProvider for FixtureProvider {
    fn id(&self) -> &'static str {
        "FIXTURE"
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::default()
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        Err(MarketDataError::SymbolNotFound(symbol.to_string()))
    }

    async fn fetch_historical(
        &self,
        symbol: &str,
        _start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Interval,
    ) -> Result<Series, MarketDataError> {
        if symbol == "MISSING" {
            return Err(MarketDataError::NoDataForRange);
        }
        let bars = (0..3)
            .map(|i| Bar {
                timestamp: end - chrono::Duration::days(i),
                open: dec!(10),
                high: dec!(11),
                low: dec!(9),
                close: dec!(10.5),
                volume: dec!(1200),
            })
            .collect();
        Ok(Series::new(symbol, interval, bars))
    }
}

fn aggregator() -> ProviderAggregator {
    let provider: Arc<dyn MarketDataProvider> = Arc::new(FixtureProvider);
    ProviderAggregator::new(vec![provider], Duration::from_secs(5))
}

#[tokio::test]
async fn writes_one_csv_per_symbol_and_reports_failures() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("raw");
    let aggregator = aggregator();
    let downloader = Downloader::new(&aggregator, &out_dir);

    let symbols = vec!["SPY".to_string(), "MISSING".to_string(), "BTC-USD".to_string()];
    let mut progress = Vec::new();
    let report = downloader
        .run(&symbols, Preset::MonthDaily.plan(), &mut progress)
        .await
        .unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.success_count(), 2);
    assert_eq!(report.failed, vec!["MISSING".to_string()]);
    assert!(!report.all_succeeded());

    let spy = output_path(&out_dir, "SPY", Interval::Daily);
    assert_eq!(report.saved[0].path, spy);
    assert_eq!(report.saved[0].rows, 3);

    let text = std::fs::read_to_string(&spy).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "timestamp,open,high,low,close,volume");
    assert!(lines[1] <= lines[3], "rows should be in timestamp order");

    assert!(out_dir.join("BTC-USD_1d_historical.csv").exists());
    assert!(!out_dir.join("MISSING_1d_historical.csv").exists());

    let progress = String::from_utf8(progress).unwrap();
    assert!(progress.contains("[1/3] Downloading SPY"));
    assert!(progress.contains("Successfully downloaded: 2/3"));
    assert!(progress.contains("Failed symbols: MISSING"));
}

#[tokio::test]
async fn custom_plan_uses_its_interval_in_file_names() {
    let dir = tempfile::tempdir().unwrap();
    let aggregator = aggregator();
    let downloader = Downloader::new(&aggregator, dir.path());

    let report = downloader
        .run(
            &["QQQ".to_string()],
            DownloadPlan::new(120, Interval::Monthly),
            &mut std::io::sink(),
        )
        .await
        .unwrap();

    assert!(report.all_succeeded());
    assert!(dir.path().join("QQQ_1mo_historical.csv").exists());
}

#[tokio::test]
async fn unwritable_file_goes_on_failed_list() {
    let dir = tempfile::tempdir().unwrap();
    let aggregator = aggregator();
    let downloader = Downloader::new(&aggregator, dir.path());

    // A directory where the CSV should go makes the write fail.
    std::fs::create_dir(output_path(dir.path(), "SPY", Interval::Daily)).unwrap();

    let symbols = vec!["SPY".to_string(), "QQQ".to_string()];
    let mut progress = Vec::new();
    let report = downloader
        .run(&symbols, Preset::MonthDaily.plan(), &mut progress)
        .await
        .unwrap();

    assert_eq!(report.failed, vec!["SPY".to_string()]);
    assert_eq!(report.success_count(), 1);
    assert_eq!(report.saved[0].symbol, "QQQ");

    let progress = String::from_utf8(progress).unwrap();
    assert!(progress.contains("error: failed to create"));
    assert!(progress.contains("Failed symbols: SPY"));
}
