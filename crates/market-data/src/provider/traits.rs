//! Market data provider trait definitions.
//!
//! This module defines the core `MarketDataProvider` trait that all
//! market data providers must implement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::{Interval, Quote, Series};
use crate::registry::RateBudget;

use super::capabilities::RateLimit;

/// Symbol quoted to check whether a provider is reachable.
pub const PROBE_SYMBOL: &str = "AAPL";

/// Trait for market data providers.
///
/// Implementors supply the two explicit-error operations
/// ([`fetch_quote`](Self::fetch_quote) and
/// [`fetch_historical`](Self::fetch_historical)). The provided `get_*`
/// wrappers never fail: a fault becomes a zero-valued [`Quote`] or an empty
/// [`Series`] and is logged.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use quantpm_market_data::provider::{MarketDataProvider, RateLimit};
///
/// struct MyProvider {
///     api_key: String,
/// }
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn rate_limit(&self) -> RateLimit {
///         RateLimit::default()
///     }
///
///     // ... implement fetch_quote / fetch_historical
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "YAHOO", "ALPHA_VANTAGE", etc.
    /// Quotes served by this provider are tagged with it.
    fn id(&self) -> &'static str;

    /// Rate limiting configuration.
    fn rate_limit(&self) -> RateLimit;

    /// Call budget, for providers with a hard quota.
    fn budget(&self) -> Option<&RateBudget> {
        None
    }

    /// Fetch the latest quote for a symbol.
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError>;

    /// Fetch bars for `[start, end]` at `interval`, ordered by timestamp.
    ///
    /// Returns `NotSupported` when the vendor cannot serve the interval.
    async fn fetch_historical(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Interval,
    ) -> Result<Series, MarketDataError>;

    /// Latest quote, or a zero-valued quote on any failure.
    async fn get_quote(&self, symbol: &str) -> Quote {
        match self.fetch_quote(symbol).await {
            Ok(quote) => quote,
            Err(e) => {
                log_failure(self.id(), "quote", symbol, &e);
                Quote::empty(symbol)
            }
        }
    }

    /// Quotes for several symbols, index-aligned with the input.
    ///
    /// The default processes symbols one at a time.
    async fn get_quotes(&self, symbols: &[String]) -> Vec<Quote> {
        let mut quotes = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            quotes.push(self.get_quote(symbol).await);
        }
        quotes
    }

    /// Historical series, or an empty series on any failure.
    async fn get_historical(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Interval,
    ) -> Series {
        match self.fetch_historical(symbol, start, end, interval).await {
            Ok(series) => series,
            Err(e) => {
                log_failure(self.id(), "historical", symbol, &e);
                Series::empty(symbol, interval)
            }
        }
    }

    /// Quote a well-known symbol to see whether the provider answers.
    async fn is_available(&self) -> bool {
        let quote = self.get_quote(PROBE_SYMBOL).await;
        let available = !quote.is_empty();
        debug!("Provider '{}' availability: {}", self.id(), available);
        available
    }
}

fn log_failure(provider: &str, operation: &str, symbol: &str, error: &MarketDataError) {
    if error.is_skip() {
        debug!("{} {} for {} skipped: {}", provider, operation, symbol, error);
    } else {
        warn!("{} {} for {} failed: {}", provider, operation, symbol, error);
    }
}
