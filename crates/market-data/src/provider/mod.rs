//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - Rate limiting metadata
//! - Concrete provider implementations (Yahoo, Alpha Vantage, Finnhub)
//!
//! Every provider translates its vendor's wire format into the canonical
//! [`Quote`](crate::models::Quote) and [`Series`](crate::models::Series).
//! Providers never fail at their public `get_*` boundary; the explicit
//! `fetch_*` operations are what the aggregator uses to tell faults apart.

mod capabilities;
mod traits;

pub mod alpha_vantage;
pub mod finnhub;
pub mod yahoo;

use futures::stream::{self, StreamExt};

use crate::models::Quote;

// Re-exports
pub use capabilities::RateLimit;
pub use traits::{MarketDataProvider, PROBE_SYMBOL};

/// Fetch quotes with at most `max_concurrency` requests in flight.
///
/// Results come back in input order regardless of completion order.
pub async fn fan_out_quotes<P>(provider: &P, symbols: &[String], max_concurrency: usize) -> Vec<Quote>
where
    P: MarketDataProvider + ?Sized,
{
    let requests: Vec<_> = symbols
        .iter()
        .map(|symbol| provider.get_quote(symbol))
        .collect();
    stream::iter(requests)
        .buffered(max_concurrency.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MarketDataError;
    use crate::models::{Interval, QuoteFields, Series};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Answers later for symbols earlier in the batch.
    struct SlowFirstProvider {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        batch_len: u64,
    }

    #[async_trait]
    impl MarketDataProvider for SlowFirstProvider {
        fn id(&self) -> &'static str {
            "SLOW_FIRST"
        }

        fn rate_limit(&self) -> RateLimit {
            RateLimit::default()
        }

        async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let index: u64 = symbol.trim_start_matches('S').parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis((self.batch_len - index) * 10)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(QuoteFields {
                price: Some(Decimal::from(index + 1)),
                ..Default::default()
            }
            .into_quote(symbol, self.id()))
        }

        async fn fetch_historical(
            &self,
            symbol: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
            interval: Interval,
        ) -> Result<Series, MarketDataError> {
            Ok(Series::empty(symbol, interval))
        }
    }

    #[tokio::test]
    async fn test_fan_out_preserves_input_order() {
        let provider = SlowFirstProvider {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            batch_len: 6,
        };
        let symbols: Vec<String> = (0..6).map(|i| format!("S{}", i)).collect();

        let quotes = fan_out_quotes(&provider, &symbols, 3).await;

        let returned: Vec<&str> = quotes.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(returned, vec!["S0", "S1", "S2", "S3", "S4", "S5"]);
        assert_eq!(quotes[5].price, Decimal::from(6));
        assert!(provider.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_fan_out_empty_batch() {
        let provider = SlowFirstProvider {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            batch_len: 0,
        };
        assert!(fan_out_quotes(&provider, &[], 4).await.is_empty());
    }
}
