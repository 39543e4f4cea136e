//! QuantPM Market Data Crate
//!
//! This crate fetches quotes and historical series from external vendors and
//! reconciles them behind one fallback chain.
//!
//! # Overview
//!
//! - Providers: Yahoo Finance (no key), Alpha Vantage (key, daily call
//!   ceiling), Finnhub (key)
//! - One canonical [`Quote`] and [`Series`] shape for every vendor
//! - Fixed per-provider call budgets instead of retry policies
//! - Deterministic, construction-ordered fallback
//!
//! # Architecture
//!
//! ```text
//!                          +---------------------+
//!     get_quote(symbol) -> | ProviderAggregator  |  (ordered fallback, timeouts)
//!                          +---------------------+
//!                             |       |       |
//!                             v       v       v
//!                          YAHOO  ALPHA_VANTAGE  FINNHUB   (MarketDataProvider)
//!                                     |
//!                                 RateBudget
//!                                     |
//!                                     v
//!                          +---------------------+
//!                          |  Quote / Series     |  (canonical shape)
//!                          +---------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Quote`] - Canonical snapshot; zero price with provider `none` means no data
//! - [`Series`] - Ordered OHLCV [`Bar`]s at one [`Interval`]
//! - [`ProviderRecord`] - Availability and budget usage of one provider
//! - [`ProviderAggregator`] - The fallback chain

pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;

// Re-export all public types from models
pub use models::{
    Bar, CryptoPair, InstrumentKind, Interval, IntradayStep, ProviderId, ProviderRecord, Quote,
    QuoteFields, Series, UnknownInterval, NO_PROVIDER,
};

// Re-export provider types
pub use provider::alpha_vantage::AlphaVantageProvider;
pub use provider::finnhub::FinnhubProvider;
pub use provider::yahoo::YahooProvider;
pub use provider::{MarketDataProvider, RateLimit, PROBE_SYMBOL};

// Re-export registry types
pub use registry::{
    AggregatorConfig, FetchDiagnostics, ProviderAggregator, ProviderAttempt, RateBudget,
    SkipReason, ALPHA_VANTAGE, DEFAULT_CALL_TIMEOUT, DEFAULT_DAILY_CALL_LIMIT, FINNHUB,
};

// Re-export error types
pub use errors::MarketDataError;
