//! Yahoo Finance market data provider.
//!
//! The zero-configuration default: no API key, no call budget. Serves
//! equities, ETFs and crypto pairs (`BTC-USD`) under their native symbols.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{debug, warn};
use yahoo_finance_api as yahoo;

use crate::errors::MarketDataError;
use crate::models::{Bar, Interval, Quote, QuoteFields, Series};
use crate::provider::{fan_out_quotes, MarketDataProvider, RateLimit};

const PROVIDER_ID: &str = "YAHOO";

/// Range requested for the latest quote; long enough to span a weekend.
const QUOTE_RANGE: &str = "5d";

/// Yahoo Finance market data provider.
pub struct YahooProvider {
    connector: yahoo::YahooConnector,
}

impl YahooProvider {
    /// Create a new Yahoo Finance provider.
    pub fn new() -> Result<Self, MarketDataError> {
        let connector = yahoo::YahooConnector::new().map_err(|e| {
            MarketDataError::provider(
                PROVIDER_ID,
                format!("Failed to initialize Yahoo connector: {}", e),
            )
        })?;
        Ok(Self { connector })
    }

    /// Convert chrono DateTime<Utc> to time::OffsetDateTime for the Yahoo API.
    fn chrono_to_offset_datetime(dt: DateTime<Utc>) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(dt.timestamp())
            .unwrap_or_else(|_| OffsetDateTime::now_utc())
    }

    fn map_yahoo_error(symbol: &str, error: yahoo::YahooError) -> MarketDataError {
        if matches!(error, yahoo::YahooError::NoQuotes | yahoo::YahooError::NoResult) {
            MarketDataError::SymbolNotFound(symbol.to_string())
        } else {
            MarketDataError::provider(PROVIDER_ID, error.to_string())
        }
    }

    /// Convert the bars of a Yahoo response, dropping unusable rows.
    fn response_bars(
        symbol: &str,
        response: &yahoo::YResponse,
    ) -> Result<Vec<Bar>, MarketDataError> {
        let yahoo_quotes = response.quotes().map_err(|e| Self::map_yahoo_error(symbol, e))?;
        Ok(yahoo_quotes
            .iter()
            .filter_map(|q| match yahoo_quote_to_bar(q) {
                Ok(bar) => Some(bar),
                Err(e) => {
                    warn!("Skipping Yahoo bar for {}: {}", symbol, e);
                    None
                }
            })
            .collect())
    }
}

/// Convert a Yahoo bar to our Bar model.
fn yahoo_quote_to_bar(yahoo_quote: &yahoo::Quote) -> Result<Bar, MarketDataError> {
    let timestamp: DateTime<Utc> = Utc
        .timestamp_opt(yahoo_quote.timestamp as i64, 0)
        .single()
        .ok_or_else(|| MarketDataError::ValidationFailed {
            message: format!("Invalid timestamp: {}", yahoo_quote.timestamp),
        })?;

    // Close price is required
    let close = Decimal::from_f64_retain(yahoo_quote.close).ok_or_else(|| {
        MarketDataError::ValidationFailed {
            message: format!(
                "Failed to convert close price {} to Decimal",
                yahoo_quote.close
            ),
        }
    })?;

    Ok(Bar {
        timestamp,
        open: Decimal::from_f64_retain(yahoo_quote.open).unwrap_or(Decimal::ZERO),
        high: Decimal::from_f64_retain(yahoo_quote.high).unwrap_or(Decimal::ZERO),
        low: Decimal::from_f64_retain(yahoo_quote.low).unwrap_or(Decimal::ZERO),
        close,
        volume: Decimal::from_u64(yahoo_quote.volume).unwrap_or(Decimal::ZERO),
    })
}

/// Build a quote from the most recent bars.
///
/// The last bar supplies the price; the one before it supplies the previous
/// close. With a single bar the previous close equals the price.
fn quote_from_bars(symbol: &str, bars: &[Bar]) -> Result<Quote, MarketDataError> {
    let last = bars
        .last()
        .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;
    let prev_close = bars
        .len()
        .checked_sub(2)
        .map(|i| bars[i].close)
        .unwrap_or(last.close);

    Ok(QuoteFields {
        price: Some(last.close),
        volume: Some(last.volume),
        timestamp: Some(last.timestamp),
        open: Some(last.open),
        high: Some(last.high),
        low: Some(last.low),
        close: Some(last.close),
        prev_close: Some(prev_close),
        ..Default::default()
    }
    .into_quote(symbol, PROVIDER_ID))
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 2000,
            max_concurrency: 10,
            min_delay: Duration::from_millis(50),
        }
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        debug!("Fetching latest quote for {} from Yahoo", symbol);

        let response = self
            .connector
            .get_quote_range(symbol, Interval::Daily.code(), QUOTE_RANGE)
            .await
            .map_err(|e| Self::map_yahoo_error(symbol, e))?;

        let mut bars = Self::response_bars(symbol, &response)?;
        bars.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        quote_from_bars(symbol, &bars)
    }

    async fn get_quotes(&self, symbols: &[String]) -> Vec<Quote> {
        fan_out_quotes(self, symbols, self.rate_limit().max_concurrency).await
    }

    async fn fetch_historical(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Interval,
    ) -> Result<Series, MarketDataError> {
        debug!(
            "Fetching {} history for {} from {} to {} from Yahoo",
            interval,
            symbol,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );

        let response = self
            .connector
            .get_quote_history_interval(
                symbol,
                Self::chrono_to_offset_datetime(start),
                Self::chrono_to_offset_datetime(end),
                interval.code(),
            )
            .await
            .map_err(|e| Self::map_yahoo_error(symbol, e))?;

        let bars = Self::response_bars(symbol, &response)?;
        if bars.is_empty() {
            warn!(
                "No historical quotes returned for '{}' between {} and {}",
                symbol,
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            );
            return Err(MarketDataError::NoDataForRange);
        }

        Ok(Series::new(symbol, interval, bars))
    }
}
