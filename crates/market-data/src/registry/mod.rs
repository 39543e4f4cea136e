//! Provider orchestration.
//!
//! This module provides:
//! - The fallback-driven [`ProviderAggregator`]
//! - Per-provider call budgets ([`RateBudget`])
//! - Attempt tracking for diagnostics ([`FetchDiagnostics`])

mod aggregator;
mod rate_budget;
mod skip_reason;

pub use aggregator::{
    AggregatorConfig, ProviderAggregator, ALPHA_VANTAGE, DEFAULT_CALL_TIMEOUT, FINNHUB,
};
pub use rate_budget::{RateBudget, DEFAULT_DAILY_CALL_LIMIT};
pub use skip_reason::{FetchDiagnostics, ProviderAttempt, SkipReason};
