//! Finnhub market data provider implementation.
//!
//! This module provides market data from Finnhub API:
//! - Quotes via the /quote endpoint
//! - Equity history via /stock/candle, crypto history via /crypto/candle
//!
//! Crypto pairs are routed to Binance tickers (`BTC-USD` -> `BINANCE:BTCUSDT`).
//! Finnhub free tier is limited to 60 API calls per minute.
//! API documentation: https://finnhub.io/docs/api

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::{
    Bar, CryptoPair, InstrumentKind, Interval, IntradayStep, Quote, QuoteFields, Series,
};
use crate::provider::{MarketDataProvider, RateLimit};

const BASE_URL: &str = "https://finnhub.io/api/v1";
const PROVIDER_ID: &str = "FINNHUB";

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from /quote endpoint
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    /// Current price
    c: Option<f64>,
    /// Change
    d: Option<f64>,
    /// Percent change
    dp: Option<f64>,
    /// High price of the day
    h: Option<f64>,
    /// Low price of the day
    l: Option<f64>,
    /// Open price of the day
    o: Option<f64>,
    /// Previous close
    pc: Option<f64>,
    /// Timestamp (Unix)
    t: Option<i64>,
}

/// Response from the candle endpoints
#[derive(Debug, Deserialize)]
struct CandleResponse {
    /// Status: "ok" or "no_data"
    s: String,
    /// Close prices
    #[serde(default)]
    c: Vec<f64>,
    /// High prices
    #[serde(default)]
    h: Vec<f64>,
    /// Low prices
    #[serde(default)]
    l: Vec<f64>,
    /// Open prices
    #[serde(default)]
    o: Vec<f64>,
    /// Volume
    #[serde(default)]
    v: Vec<f64>,
    /// Timestamps (Unix)
    #[serde(default)]
    t: Vec<i64>,
}

/// Error response from Finnhub
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
}

// ============================================================================
// FinnhubProvider
// ============================================================================

/// Finnhub market data provider.
pub struct FinnhubProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FinnhubProvider {
    /// Create a new Finnhub provider with the given API key.
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the provider at another endpoint (self-hosted proxy, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Make a GET request to the Finnhub API.
    async fn fetch(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String, MarketDataError> {
        let url = format!("{}{}", self.base_url, endpoint);

        // API key goes in a header, never in the query string
        let request = self
            .client
            .get(&url)
            .header("X-Finnhub-Token", &self.api_key)
            .query(params);

        debug!(
            "Finnhub request: {} with {} params",
            endpoint,
            params.len()
        );

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                MarketDataError::provider(PROVIDER_ID, format!("Request failed: {}", e))
            }
        })?;

        let status = response.status();

        // 429 is throttling, 403 is an exhausted key quota
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(MarketDataError::provider(
                PROVIDER_ID,
                "Invalid or missing API key",
            ));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            if let Some(error_msg) = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error)
            {
                return Err(MarketDataError::provider(PROVIDER_ID, error_msg));
            }

            return Err(MarketDataError::provider(
                PROVIDER_ID,
                format!("HTTP {} - {}", status, body),
            ));
        }

        response.text().await.map_err(|e| {
            MarketDataError::provider(PROVIDER_ID, format!("Failed to read response: {}", e))
        })
    }

    /// Finnhub ticker for a symbol. Crypto pairs map to Binance USDT pairs.
    fn vendor_symbol(symbol: &str) -> String {
        match CryptoPair::parse(symbol) {
            Some(pair) => format!("BINANCE:{}USDT", pair.base),
            None => symbol.to_string(),
        }
    }

    fn candle_endpoint(symbol: &str) -> &'static str {
        match InstrumentKind::classify(symbol) {
            InstrumentKind::Crypto => "/crypto/candle",
            InstrumentKind::Equity => "/stock/candle",
        }
    }

    /// Candle resolution for an interval.
    fn resolution(interval: Interval) -> &'static str {
        match interval {
            Interval::Daily => "D",
            Interval::Weekly => "W",
            Interval::Monthly => "M",
            Interval::Intraday(IntradayStep::OneMinute) => "1",
            Interval::Intraday(IntradayStep::FiveMinutes) => "5",
            Interval::Intraday(IntradayStep::FifteenMinutes) => "15",
            Interval::Intraday(IntradayStep::ThirtyMinutes) => "30",
            Interval::Intraday(IntradayStep::SixtyMinutes) => "60",
        }
    }

    /// Parse a /quote payload.
    fn parse_quote(text: &str, symbol: &str) -> Result<Quote, MarketDataError> {
        let response: QuoteResponse = serde_json::from_str(text).map_err(|e| {
            MarketDataError::provider(
                PROVIDER_ID,
                format!("Failed to parse quote response: {}", e),
            )
        })?;

        let close = response.c.ok_or_else(|| {
            MarketDataError::SymbolNotFound(format!("No quote data for symbol: {}", symbol))
        })?;

        // Finnhub returns 0 for unknown symbols instead of an error
        if close == 0.0 && response.o.unwrap_or(0.0) == 0.0 {
            return Err(MarketDataError::SymbolNotFound(format!(
                "Symbol not found or no trading data: {}",
                symbol
            )));
        }

        let price = Decimal::try_from(close).map_err(|_| MarketDataError::ValidationFailed {
            message: format!("Invalid close price: {}", close),
        })?;
        let to_decimal = |v: Option<f64>| v.and_then(|v| Decimal::try_from(v).ok());

        // /quote carries no volume
        Ok(QuoteFields {
            price: Some(price),
            change: to_decimal(response.d),
            change_percent: to_decimal(response.dp),
            timestamp: response.t.and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
            open: to_decimal(response.o),
            high: to_decimal(response.h),
            low: to_decimal(response.l),
            prev_close: to_decimal(response.pc),
            ..Default::default()
        }
        .into_quote(symbol, PROVIDER_ID))
    }

    /// Parse a candle payload into ascending bars.
    fn parse_candles(text: &str) -> Result<Vec<Bar>, MarketDataError> {
        let response: CandleResponse = serde_json::from_str(text).map_err(|e| {
            MarketDataError::provider(
                PROVIDER_ID,
                format!("Failed to parse candle response: {}", e),
            )
        })?;

        if response.s == "no_data" {
            return Err(MarketDataError::NoDataForRange);
        }

        if response.s != "ok" {
            return Err(MarketDataError::provider(
                PROVIDER_ID,
                format!("Unexpected candle status: {}", response.s),
            ));
        }

        let len = response.t.len();
        if response.c.len() != len
            || response.o.len() != len
            || response.h.len() != len
            || response.l.len() != len
        {
            return Err(MarketDataError::provider(
                PROVIDER_ID,
                "Mismatched array lengths in candle response",
            ));
        }

        let mut bars = Vec::with_capacity(len);
        for i in 0..len {
            let Some(timestamp) = Utc.timestamp_opt(response.t[i], 0).single() else {
                warn!("Invalid timestamp at index {}: {}", i, response.t[i]);
                continue;
            };

            let Ok(close) = Decimal::try_from(response.c[i]) else {
                warn!("Invalid close price at index {}: {}", i, response.c[i]);
                continue;
            };

            bars.push(Bar {
                timestamp,
                open: Decimal::try_from(response.o[i]).unwrap_or(Decimal::ZERO),
                high: Decimal::try_from(response.h[i]).unwrap_or(Decimal::ZERO),
                low: Decimal::try_from(response.l[i]).unwrap_or(Decimal::ZERO),
                close,
                volume: response
                    .v
                    .get(i)
                    .and_then(|&v| Decimal::try_from(v).ok())
                    .unwrap_or(Decimal::ZERO),
            });
        }

        Ok(bars)
    }
}

// ============================================================================
// MarketDataProvider Implementation
// ============================================================================

#[async_trait]
impl MarketDataProvider for FinnhubProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 60, // Free tier limit
            max_concurrency: 5,
            min_delay: Duration::from_millis(100),
        }
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let vendor_symbol = Self::vendor_symbol(symbol);
        debug!("Fetching latest quote for {} from Finnhub", vendor_symbol);

        let text = self.fetch("/quote", &[("symbol", vendor_symbol.as_str())]).await?;
        Self::parse_quote(&text, symbol)
    }

    async fn fetch_historical(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Interval,
    ) -> Result<Series, MarketDataError> {
        let vendor_symbol = Self::vendor_symbol(symbol);
        let endpoint = Self::candle_endpoint(symbol);
        let from_ts = start.timestamp().to_string();
        let to_ts = end.timestamp().to_string();

        let params = [
            ("symbol", vendor_symbol.as_str()),
            ("resolution", Self::resolution(interval)),
            ("from", from_ts.as_str()),
            ("to", to_ts.as_str()),
        ];

        let text = self.fetch(endpoint, &params).await?;
        let bars = Self::parse_candles(&text)?;
        if bars.is_empty() {
            return Err(MarketDataError::NoDataForRange);
        }

        debug!(
            "Finnhub: fetched {} bars for {} ({} to {})",
            bars.len(),
            symbol,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );

        Ok(Series::new(symbol, interval, bars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::HeaderMap, routing::get, Json, Router};
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    #[test]
    fn test_provider_id() {
        let provider = FinnhubProvider::new("test_key".to_string());
        assert_eq!(provider.id(), "FINNHUB");
        assert!(provider.budget().is_none());
    }

    #[test]
    fn test_vendor_symbol() {
        assert_eq!(FinnhubProvider::vendor_symbol("AAPL"), "AAPL");
        assert_eq!(FinnhubProvider::vendor_symbol("BTC-USD"), "BINANCE:BTCUSDT");
        assert_eq!(FinnhubProvider::vendor_symbol("eth-usd"), "BINANCE:ETHUSDT");
        assert_eq!(FinnhubProvider::vendor_symbol("BRK-B"), "BRK-B");
    }

    #[test]
    fn test_candle_endpoint() {
        assert_eq!(FinnhubProvider::candle_endpoint("SOL-USD"), "/crypto/candle");
        assert_eq!(FinnhubProvider::candle_endpoint("AAPL"), "/stock/candle");
        assert_eq!(FinnhubProvider::candle_endpoint("BRK-B"), "/stock/candle");
    }

    #[test]
    fn test_resolution() {
        assert_eq!(FinnhubProvider::resolution(Interval::Daily), "D");
        assert_eq!(FinnhubProvider::resolution(Interval::Weekly), "W");
        assert_eq!(FinnhubProvider::resolution(Interval::Monthly), "M");
        assert_eq!(
            FinnhubProvider::resolution(Interval::Intraday(IntradayStep::FifteenMinutes)),
            "15"
        );
    }

    #[test]
    fn test_quote_response_parsing() {
        let json = r#"{
            "c": 150.25,
            "d": 1.50,
            "dp": 1.01,
            "h": 152.00,
            "l": 148.50,
            "o": 149.00,
            "pc": 148.75,
            "t": 1704067200
        }"#;

        let quote = FinnhubProvider::parse_quote(json, "AAPL").unwrap();
        assert_eq!(quote.price, dec!(150.25));
        assert_eq!(quote.change, dec!(1.5));
        assert_eq!(quote.change_percent, dec!(1.01));
        assert_eq!(quote.prev_close, dec!(148.75));
        assert_eq!(quote.bid, dec!(150.25));
        assert_eq!(quote.volume, Decimal::ZERO);
        assert_eq!(quote.timestamp.timestamp(), 1704067200);
        assert_eq!(quote.provider, "FINNHUB");
    }

    #[test]
    fn test_quote_unknown_symbol() {
        let json = r#"{"c": 0, "d": null, "dp": null, "h": 0, "l": 0, "o": 0, "pc": 0, "t": 0}"#;
        let err = FinnhubProvider::parse_quote(json, "ZZZZ").unwrap_err();
        assert!(matches!(err, MarketDataError::SymbolNotFound(_)));
    }

    #[test]
    fn test_candle_response_parsing() {
        let json = r#"{
            "s": "ok",
            "c": [152.0, 150.0, 151.0],
            "h": [153.0, 151.0, 152.0],
            "l": [151.0, 149.0, 150.0],
            "o": [151.5, 149.5, 150.5],
            "v": [1200000, 1000000, 1100000],
            "t": [1704240000, 1704067200, 1704153600]
        }"#;

        let bars = FinnhubProvider::parse_candles(json).unwrap();
        assert_eq!(bars.len(), 3);

        let series = Series::new("AAPL", Interval::Daily, bars);
        let closes: Vec<_> = series.bars().iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![dec!(150), dec!(151), dec!(152)]);
        assert_eq!(series.bars()[0].volume, dec!(1000000));
    }

    #[test]
    fn test_candle_response_no_data() {
        let err = FinnhubProvider::parse_candles(r#"{"s": "no_data"}"#).unwrap_err();
        assert!(matches!(err, MarketDataError::NoDataForRange));
    }

    #[test]
    fn test_candle_mismatched_lengths() {
        let json = r#"{"s": "ok", "c": [1.0], "h": [], "l": [], "o": [], "t": [1704067200]}"#;
        assert!(FinnhubProvider::parse_candles(json).is_err());
    }

    #[tokio::test]
    async fn test_quote_over_http_sends_token_header() {
        async fn quote(
            headers: HeaderMap,
            Query(params): Query<HashMap<String, String>>,
        ) -> Json<Value> {
            let authorized = headers
                .get("X-Finnhub-Token")
                .and_then(|v| v.to_str().ok())
                == Some("secret");
            if authorized && params.get("symbol").map(String::as_str) == Some("BINANCE:BTCUSDT") {
                Json(json!({"c": 64000.5, "d": 500.5, "dp": 0.79, "h": 64500, "l": 63000, "o": 63500, "pc": 63500, "t": 1704067200}))
            } else {
                Json(json!({"c": 0, "h": 0, "l": 0, "o": 0, "pc": 0, "t": 0}))
            }
        }

        let app = Router::new().route("/quote", get(quote));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let provider =
            FinnhubProvider::new("secret".to_string()).with_base_url(format!("http://{}", addr));

        let quote = provider.get_quote("BTC-USD").await;
        assert_eq!(quote.symbol, "BTC-USD");
        assert_eq!(quote.price, dec!(64000.5));

        let missing = provider.get_quote("AAPL").await;
        assert!(missing.is_empty());
        assert!(!provider.is_available().await);
    }
}
