//! Market data models
//!
//! This module contains the core data types for market data operations:
//! - `types` - Type aliases for common identifiers (ProviderId)
//! - `instrument` - Symbol classification (InstrumentKind, CryptoPair)
//! - `quote` - Canonical quote and the vendor payload normalizer (Quote, QuoteFields)
//! - `interval` - Bar granularity (Interval)
//! - `series` - Historical OHLCV data (Bar, Series)
//! - `provider_record` - Per-provider status and budget snapshot (ProviderRecord)

mod instrument;
mod interval;
mod provider_record;
mod quote;
mod series;
mod types;

pub use instrument::{CryptoPair, InstrumentKind};
pub use interval::{IntradayStep, Interval, UnknownInterval};
pub use provider_record::ProviderRecord;
pub use quote::{derive_change, Quote, QuoteFields, NO_PROVIDER};
pub use series::{Bar, Series};
pub use types::ProviderId;
