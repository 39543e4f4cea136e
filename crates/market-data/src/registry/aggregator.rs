//! Fallback-driven coordinator over all configured providers.
//!
//! The aggregator walks its providers strictly in construction order. The
//! first provider that returns a usable answer wins; faults, timeouts and
//! empty answers fall through to the next one. When every provider has been
//! tried the caller still gets a structurally complete result: a zero-valued
//! [`Quote`] tagged [`NO_PROVIDER`](crate::models::NO_PROVIDER) or an empty
//! [`Series`].

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use super::rate_budget::DEFAULT_DAILY_CALL_LIMIT;
use super::skip_reason::FetchDiagnostics;
use crate::errors::MarketDataError;
use crate::models::{Interval, ProviderId, ProviderRecord, Quote, Series};
use crate::provider::alpha_vantage::AlphaVantageProvider;
use crate::provider::finnhub::FinnhubProvider;
use crate::provider::yahoo::YahooProvider;
use crate::provider::MarketDataProvider;

/// Credential key for the Alpha Vantage provider.
pub const ALPHA_VANTAGE: &str = "ALPHA_VANTAGE";
/// Credential key for the Finnhub provider.
pub const FINNHUB: &str = "FINNHUB";

/// Default bound on a single provider call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Immutable inputs for building an aggregator.
#[derive(Clone, Debug)]
pub struct AggregatorConfig {
    /// API keys keyed by provider id (`ALPHA_VANTAGE`, `FINNHUB`).
    pub credentials: HashMap<String, String>,
    /// Upper bound on each individual provider call.
    pub call_timeout: Duration,
    /// Daily call ceiling for Alpha Vantage.
    pub alpha_vantage_daily_limit: u32,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            credentials: HashMap::new(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            alpha_vantage_daily_limit: DEFAULT_DAILY_CALL_LIMIT,
        }
    }
}

impl AggregatorConfig {
    /// Non-blank credential for a provider.
    pub fn credential(&self, provider: &str) -> Option<&str> {
        self.credentials
            .get(provider)
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
    }

    pub fn with_credential(mut self, provider: &str, key: impl Into<String>) -> Self {
        self.credentials.insert(provider.to_string(), key.into());
        self
    }
}

/// Ordered provider chain with fallback.
pub struct ProviderAggregator {
    providers: Vec<Arc<dyn MarketDataProvider>>,
    /// Last availability result per provider, index-aligned with `providers`.
    availability: Mutex<Vec<Option<bool>>>,
    call_timeout: Duration,
}

impl ProviderAggregator {
    /// Build the provider chain from configuration.
    ///
    /// Yahoo is always first; Alpha Vantage and Finnhub follow when their
    /// keys are present.
    pub fn from_config(config: &AggregatorConfig) -> Result<Self, MarketDataError> {
        let mut providers: Vec<Arc<dyn MarketDataProvider>> = vec![Arc::new(YahooProvider::new()?)];

        if let Some(key) = config.credential(ALPHA_VANTAGE) {
            providers.push(Arc::new(AlphaVantageProvider::new(
                key.to_string(),
                config.alpha_vantage_daily_limit,
            )));
        } else {
            debug!("No Alpha Vantage key configured, provider disabled");
        }

        if let Some(key) = config.credential(FINNHUB) {
            providers.push(Arc::new(FinnhubProvider::new(key.to_string())));
        } else {
            debug!("No Finnhub key configured, provider disabled");
        }

        let aggregator = Self::new(providers, config.call_timeout);
        info!(
            "Market data providers: {}",
            aggregator.provider_ids().join(" -> ")
        );
        Ok(aggregator)
    }

    /// Build an aggregator over an explicit provider list.
    pub fn new(providers: Vec<Arc<dyn MarketDataProvider>>, call_timeout: Duration) -> Self {
        let availability = Mutex::new(vec![None; providers.len()]);
        Self {
            providers,
            availability,
            call_timeout,
        }
    }

    /// Provider ids in fallback order.
    pub fn provider_ids(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Lock the availability table, recovering from poison if necessary.
    fn lock_availability(&self) -> MutexGuard<'_, Vec<Option<bool>>> {
        self.availability.lock().unwrap_or_else(|poisoned| {
            warn!("Provider availability mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Run one provider call under the per-call timeout.
    async fn bounded<T, F>(&self, provider_id: &str, call: F) -> Result<T, MarketDataError>
    where
        F: Future<Output = Result<T, MarketDataError>>,
    {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(MarketDataError::Timeout {
                    provider: provider_id.to_string(),
                })
            })
    }

    /// Latest quote from the first provider with a positive price.
    pub async fn get_quote(&self, symbol: &str) -> Quote {
        let (quote, diagnostics) = self.get_quote_with_diagnostics(symbol).await;
        if !diagnostics.has_success() {
            warn!(
                "No provider could price {}: {}",
                symbol,
                diagnostics.summary()
            );
        }
        quote
    }

    /// Like [`get_quote`](Self::get_quote), with the per-provider trail.
    pub async fn get_quote_with_diagnostics(&self, symbol: &str) -> (Quote, FetchDiagnostics) {
        let mut diagnostics = FetchDiagnostics::new();

        for provider in &self.providers {
            let provider_id: ProviderId = Cow::Borrowed(provider.id());

            match self
                .bounded(provider.id(), provider.fetch_quote(symbol))
                .await
            {
                Ok(quote) if !quote.is_empty() => {
                    debug!("Quote for {} served by '{}'", symbol, provider_id);
                    diagnostics.record_success(provider_id);
                    return (quote.with_provider(provider.id()), diagnostics);
                }
                Ok(_) => {
                    debug!("Provider '{}' had no price for {}", provider_id, symbol);
                    diagnostics.record_no_data(provider_id);
                }
                Err(e) => {
                    if e.is_skip() {
                        debug!("Provider '{}' skipped for {}: {}", provider_id, symbol, e);
                    } else {
                        warn!("Provider '{}' failed for {}: {}", provider_id, symbol, e);
                    }
                    diagnostics.record_failure(provider_id, &e);
                }
            }
        }

        (Quote::empty(symbol), diagnostics)
    }

    /// Quotes for several symbols, index-aligned with the input.
    ///
    /// Symbols are resolved one after another, each through the full
    /// fallback chain.
    pub async fn get_quotes(&self, symbols: &[String]) -> Vec<Quote> {
        let mut quotes = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            quotes.push(self.get_quote(symbol).await);
        }
        quotes
    }

    /// Bars from the first provider with a non-empty series.
    pub async fn get_historical(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Interval,
    ) -> Series {
        let (series, diagnostics) = self
            .get_historical_with_diagnostics(symbol, start, end, interval)
            .await;
        if !diagnostics.has_success() {
            warn!(
                "No provider had {} history for {}: {}",
                interval,
                symbol,
                diagnostics.summary()
            );
        }
        series
    }

    /// Like [`get_historical`](Self::get_historical), with the per-provider trail.
    pub async fn get_historical_with_diagnostics(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Interval,
    ) -> (Series, FetchDiagnostics) {
        let mut diagnostics = FetchDiagnostics::new();

        for provider in &self.providers {
            let provider_id: ProviderId = Cow::Borrowed(provider.id());

            match self
                .bounded(
                    provider.id(),
                    provider.fetch_historical(symbol, start, end, interval),
                )
                .await
            {
                Ok(series) if !series.is_empty() => {
                    info!(
                        "Fetched {} {} bars for {} from '{}'",
                        series.len(),
                        interval,
                        symbol,
                        provider_id
                    );
                    diagnostics.record_success(provider_id);
                    return (series, diagnostics);
                }
                Ok(_) => diagnostics.record_no_data(provider_id),
                Err(e) => {
                    if e.is_skip() {
                        debug!("Provider '{}' skipped for {}: {}", provider_id, symbol, e);
                    } else {
                        warn!("Provider '{}' failed for {}: {}", provider_id, symbol, e);
                    }
                    diagnostics.record_failure(provider_id, &e);
                }
            }
        }

        (Series::empty(symbol, interval), diagnostics)
    }

    /// Check every provider and record the outcome.
    ///
    /// A check that times out counts as unavailable.
    pub async fn check_providers(&self) -> BTreeMap<String, bool> {
        let mut statuses = BTreeMap::new();

        for (index, provider) in self.providers.iter().enumerate() {
            let available = tokio::time::timeout(self.call_timeout, provider.is_available())
                .await
                .unwrap_or(false);

            self.lock_availability()[index] = Some(available);
            info!("Provider '{}' available: {}", provider.id(), available);
            statuses.insert(provider.id().to_string(), available);
        }

        statuses
    }

    /// Snapshot of every provider's status and call budget, in order.
    pub fn provider_records(&self) -> Vec<ProviderRecord> {
        let availability = self.lock_availability();
        self.providers
            .iter()
            .zip(availability.iter())
            .map(|(provider, available)| {
                let budget = provider.budget();
                ProviderRecord {
                    id: provider.id().to_string(),
                    available: *available,
                    calls_used: budget.map_or(0, |b| b.used()),
                    call_limit: budget.map(|b| b.limit()),
                }
            })
            .collect()
    }

    /// Start a new quota period for every budgeted provider.
    pub fn reset_budgets(&self) {
        for provider in &self.providers {
            if let Some(budget) = provider.budget() {
                budget.reset();
                info!("Reset call budget for '{}'", provider.id());
            }
        }
    }
}
