//! Alpha Vantage market data provider implementation.
//!
//! This module provides market data from Alpha Vantage API:
//! - Equity quotes via GLOBAL_QUOTE
//! - Crypto quotes and history via DIGITAL_CURRENCY_DAILY / _WEEKLY / _MONTHLY
//! - Equity history via TIME_SERIES_DAILY / _WEEKLY / _MONTHLY / _INTRADAY
//!
//! Note: the free tier allows 25 API calls per day. Every outbound request
//! consumes one unit of the provider's [`RateBudget`]; once it is used up
//! the provider answers with empty results and sends nothing.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use log::{debug, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::MarketDataError;
use crate::models::{Bar, CryptoPair, Interval, IntradayStep, Quote, QuoteFields, Series};
use crate::provider::{MarketDataProvider, RateLimit};
use crate::registry::RateBudget;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER_ID: &str = "ALPHA_VANTAGE";

/// Days of history the `compact` output size reliably covers (100 bars).
const COMPACT_WINDOW_DAYS: i64 = 140;

/// Alpha Vantage market data provider.
///
/// Supports equities and USD crypto pairs. Requests are budgeted.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
    base_url: String,
    budget: RateBudget,
}

// ============================================================================
// Response structures for Alpha Vantage API
// ============================================================================

/// GLOBAL_QUOTE response for equities
#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "02. open")]
    open: Option<String>,
    #[serde(rename = "03. high")]
    high: Option<String>,
    #[serde(rename = "04. low")]
    low: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
    #[serde(rename = "08. previous close")]
    previous_close: Option<String>,
    #[serde(rename = "09. change")]
    change: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

/// Any time series response.
///
/// The series key depends on the function (`Time Series (Daily)`,
/// `Weekly Time Series`, `Time Series (5min)`,
/// `Time Series (Digital Currency Daily)`), so it is captured dynamically.
#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(flatten)]
    sections: HashMap<String, serde_json::Value>,
}

impl TimeSeriesResponse {
    /// Take the time series section out of the response.
    fn into_rows(self) -> Option<HashMap<String, SeriesRow>> {
        self.sections
            .into_iter()
            .find(|(key, _)| key.contains("Time Series"))
            .and_then(|(_, value)| serde_json::from_value(value).ok())
    }
}

/// One bar of a time series with dynamic field names.
///
/// Equities use `1. open`; crypto uses `1a. open (USD)` / `1b. open (USD)`
/// on older payloads and `1. open` on newer ones.
#[derive(Debug, Deserialize)]
struct SeriesRow {
    #[serde(flatten)]
    fields: HashMap<String, serde_json::Value>,
}

impl SeriesRow {
    /// Look up a field by name, ignoring its numbered prefix and market
    /// suffix. When several variants exist the lowest key wins (`1a` over `1b`).
    fn field(&self, name: &str) -> Option<Decimal> {
        self.fields
            .iter()
            .filter(|(key, _)| {
                key.split_once(". ")
                    .map_or(false, |(_, label)| label.starts_with(name))
            })
            .min_by(|(a, _), (b, _)| a.cmp(b))
            .and_then(|(_, value)| value.as_str())
            .and_then(AlphaVantageProvider::parse_decimal)
    }

    fn to_bar(&self, timestamp: DateTime<Utc>) -> Option<Bar> {
        Some(Bar {
            timestamp,
            open: self.field("open").unwrap_or(Decimal::ZERO),
            high: self.field("high").unwrap_or(Decimal::ZERO),
            low: self.field("low").unwrap_or(Decimal::ZERO),
            close: self.field("close")?,
            volume: self.field("volume").unwrap_or(Decimal::ZERO),
        })
    }
}

// ============================================================================
// AlphaVantageProvider implementation
// ============================================================================

impl AlphaVantageProvider {
    /// Create a new Alpha Vantage provider with the given API key and daily
    /// call ceiling.
    pub fn new(api_key: String, daily_limit: u32) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            base_url: BASE_URL.to_string(),
            budget: RateBudget::new(PROVIDER_ID, daily_limit),
        }
    }

    /// Point the provider at another endpoint (self-hosted proxy, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Make a request to the Alpha Vantage API.
    ///
    /// Consumes one unit of the call budget before anything is sent.
    async fn fetch(&self, params: &[(&str, &str)]) -> Result<String, MarketDataError> {
        if !self.budget.try_consume() {
            return Err(MarketDataError::BudgetExhausted {
                provider: PROVIDER_ID.to_string(),
                limit: self.budget.limit(),
            });
        }

        let mut all_params: Vec<(&str, &str)> = params.to_vec();
        all_params.push(("apikey", &self.api_key));

        let url = reqwest::Url::parse_with_params(&self.base_url, &all_params).map_err(|e| {
            MarketDataError::provider(PROVIDER_ID, format!("Failed to build URL: {}", e))
        })?;

        debug!(
            "Alpha Vantage request: {}",
            url.as_str().replace(&self.api_key, "***")
        );

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                MarketDataError::provider(PROVIDER_ID, e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if !status.is_success() {
            return Err(MarketDataError::provider(
                PROVIDER_ID,
                format!("HTTP {}", status),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| MarketDataError::provider(PROVIDER_ID, e.to_string()))
    }

    /// Check for API-level errors in the response.
    fn check_api_error(
        error_message: &Option<String>,
        note: &Option<String>,
        information: &Option<String>,
    ) -> Result<(), MarketDataError> {
        if let Some(ref msg) = error_message {
            // Check if it's a "not found" type error
            if msg.contains("Invalid API call") || msg.contains("not found") {
                return Err(MarketDataError::SymbolNotFound(msg.clone()));
            }
            return Err(MarketDataError::provider(PROVIDER_ID, msg.clone()));
        }

        // "Note" and "Information" both carry throttling notices
        for msg in [note, information].into_iter().flatten() {
            if msg.contains("API call frequency")
                || msg.contains("rate limit")
                || msg.contains("requests per day")
            {
                return Err(MarketDataError::RateLimited {
                    provider: PROVIDER_ID.to_string(),
                });
            }
            warn!("Alpha Vantage notice: {}", msg);
        }

        Ok(())
    }

    /// Parse `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS` to DateTime<Utc>.
    fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
        let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })?;
        Utc.from_local_datetime(&naive).single()
    }

    /// Parse a decimal value from a string, accepting a trailing `%`.
    fn parse_decimal(s: &str) -> Option<Decimal> {
        Decimal::from_str(s.trim().trim_end_matches('%')).ok()
    }

    fn parse_json<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, MarketDataError> {
        serde_json::from_str(text).map_err(|e| {
            MarketDataError::provider(PROVIDER_ID, format!("Failed to parse response: {}", e))
        })
    }

    /// Endpoint function and extra parameters for an equity series.
    fn equity_series_params(
        interval: Interval,
        start: DateTime<Utc>,
    ) -> (&'static str, Vec<(&'static str, &'static str)>) {
        // Compact intraday only covers the latest 100 bars, a few hours at 1min.
        let output_size = if interval.is_intraday()
            || Utc::now() - start > ChronoDuration::days(COMPACT_WINDOW_DAYS)
        {
            "full"
        } else {
            "compact"
        };
        match interval {
            Interval::Daily => ("TIME_SERIES_DAILY", vec![("outputsize", output_size)]),
            Interval::Weekly => ("TIME_SERIES_WEEKLY", vec![]),
            Interval::Monthly => ("TIME_SERIES_MONTHLY", vec![]),
            Interval::Intraday(step) => (
                "TIME_SERIES_INTRADAY",
                vec![
                    ("interval", Self::intraday_code(step)),
                    ("outputsize", output_size),
                ],
            ),
        }
    }

    fn intraday_code(step: IntradayStep) -> &'static str {
        match step {
            IntradayStep::OneMinute => "1min",
            IntradayStep::FiveMinutes => "5min",
            IntradayStep::FifteenMinutes => "15min",
            IntradayStep::ThirtyMinutes => "30min",
            IntradayStep::SixtyMinutes => "60min",
        }
    }

    fn crypto_series_function(interval: Interval) -> Option<&'static str> {
        match interval {
            Interval::Daily => Some("DIGITAL_CURRENCY_DAILY"),
            Interval::Weekly => Some("DIGITAL_CURRENCY_WEEKLY"),
            Interval::Monthly => Some("DIGITAL_CURRENCY_MONTHLY"),
            Interval::Intraday(_) => None,
        }
    }

    /// Parse a time series payload into ascending bars.
    fn parse_series(text: &str, symbol: &str) -> Result<Vec<Bar>, MarketDataError> {
        let response: TimeSeriesResponse = Self::parse_json(text)?;

        Self::check_api_error(
            &response.error_message,
            &response.note,
            &response.information,
        )?;

        let rows = response.into_rows().ok_or_else(|| {
            MarketDataError::SymbolNotFound(format!("No data for symbol: {}", symbol))
        })?;

        let mut bars: Vec<Bar> = rows
            .iter()
            .filter_map(|(date_str, row)| row.to_bar(Self::parse_timestamp(date_str)?))
            .collect();

        // Sort by timestamp ascending
        bars.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        debug!(
            "Alpha Vantage: parsed {} bars for {}",
            bars.len(),
            symbol
        );

        Ok(bars)
    }

    /// Parse a GLOBAL_QUOTE payload.
    fn parse_global_quote(text: &str, symbol: &str) -> Result<Quote, MarketDataError> {
        let response: GlobalQuoteResponse = Self::parse_json(text)?;

        Self::check_api_error(
            &response.error_message,
            &response.note,
            &response.information,
        )?;

        // Unknown symbols come back as an empty "Global Quote" object
        let quote = response
            .global_quote
            .filter(|q| q.price.is_some())
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let parse = |value: &Option<String>| value.as_deref().and_then(Self::parse_decimal);

        Ok(QuoteFields {
            price: parse(&quote.price),
            change: parse(&quote.change),
            change_percent: parse(&quote.change_percent),
            volume: parse(&quote.volume),
            timestamp: quote
                .latest_trading_day
                .as_deref()
                .and_then(Self::parse_timestamp),
            open: parse(&quote.open),
            high: parse(&quote.high),
            low: parse(&quote.low),
            prev_close: parse(&quote.previous_close),
            ..Default::default()
        }
        .into_quote(symbol, PROVIDER_ID))
    }

    /// Build a quote from the two most recent daily crypto bars.
    fn quote_from_crypto_bars(symbol: &str, bars: &[Bar]) -> Result<Quote, MarketDataError> {
        let latest = bars
            .last()
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;
        let prev_close = bars
            .len()
            .checked_sub(2)
            .map(|i| bars[i].close)
            .unwrap_or(latest.close);

        Ok(QuoteFields {
            price: Some(latest.close),
            volume: Some(latest.volume),
            timestamp: Some(latest.timestamp),
            open: Some(latest.open),
            high: Some(latest.high),
            low: Some(latest.low),
            prev_close: Some(prev_close),
            ..Default::default()
        }
        .into_quote(symbol, PROVIDER_ID))
    }

    async fn fetch_equity_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let params = [("function", "GLOBAL_QUOTE"), ("symbol", symbol)];
        let text = self.fetch(&params).await?;
        Self::parse_global_quote(&text, symbol)
    }

    async fn fetch_crypto_quote(
        &self,
        symbol: &str,
        pair: &CryptoPair,
    ) -> Result<Quote, MarketDataError> {
        let params = [
            ("function", "DIGITAL_CURRENCY_DAILY"),
            ("symbol", pair.base.as_str()),
            ("market", pair.market.as_str()),
        ];
        let text = self.fetch(&params).await?;
        let bars = Self::parse_series(&text, symbol)?;
        Self::quote_from_crypto_bars(symbol, &bars)
    }
}

// ============================================================================
// MarketDataProvider trait implementation
// ============================================================================

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 5,             // Free tier is very limited
            max_concurrency: 1,                 // Sequential requests only
            min_delay: Duration::from_secs(12), // ~5 requests per minute
        }
    }

    fn budget(&self) -> Option<&RateBudget> {
        Some(&self.budget)
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        match CryptoPair::parse(symbol) {
            Some(pair) => self.fetch_crypto_quote(symbol, &pair).await,
            None => self.fetch_equity_quote(symbol).await,
        }
    }

    async fn get_quotes(&self, symbols: &[String]) -> Vec<Quote> {
        let mut quotes = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            if self.budget.is_exhausted() {
                debug!("Alpha Vantage budget exhausted, skipping {}", symbol);
                quotes.push(Quote::empty(symbol));
            } else {
                quotes.push(self.get_quote(symbol).await);
            }
        }
        quotes
    }

    async fn fetch_historical(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Interval,
    ) -> Result<Series, MarketDataError> {
        let text = match CryptoPair::parse(symbol) {
            Some(pair) => {
                let function = Self::crypto_series_function(interval).ok_or_else(|| {
                    MarketDataError::NotSupported {
                        operation: format!("crypto history at {}", interval),
                        provider: PROVIDER_ID.to_string(),
                    }
                })?;
                let params = [
                    ("function", function),
                    ("symbol", pair.base.as_str()),
                    ("market", pair.market.as_str()),
                ];
                self.fetch(&params).await?
            }
            None => {
                let (function, extra) = Self::equity_series_params(interval, start);
                let mut params = vec![("function", function), ("symbol", symbol)];
                params.extend(extra);
                self.fetch(&params).await?
            }
        };

        let series = Series::new(symbol, interval, Self::parse_series(&text, symbol)?)
            .within(start, end);

        if series.is_empty() {
            return Err(MarketDataError::NoDataForRange);
        }

        Ok(series)
    }
}
