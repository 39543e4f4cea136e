//! Error types for the market data crate.
//!
//! Adapters use [`MarketDataError`] internally and convert it into an empty
//! result at their public boundary. The aggregator sees the explicit error
//! through the `fetch_*` operations, which lets it tell a provider that was
//! never attempted apart from one that failed.

use thiserror::Error;

/// Errors that can occur during market data operations.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The requested symbol was not found by the provider.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The provider cannot serve this kind of request (interval, endpoint).
    #[error("Not supported: {operation} by {provider}")]
    NotSupported {
        /// The operation that was requested
        operation: String,
        /// The provider that does not support it
        provider: String,
    },

    /// The symbol exists but has no data in the requested window.
    #[error("No data for date range")]
    NoDataForRange,

    /// The vendor rejected the request for exceeding its rate limit (HTTP 429
    /// or an in-band throttling notice).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The local call budget for this provider is used up. No request was sent.
    #[error("Call budget exhausted: {provider} ({limit} calls)")]
    BudgetExhausted {
        /// The provider whose budget is exhausted
        provider: String,
        /// The configured ceiling
        limit: u32,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// A provider-specific error occurred.
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The provider returned data that could not be turned into a quote.
    #[error("Validation failed: {message}")]
    ValidationFailed {
        /// Description of the validation failure
        message: String,
    },

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Returns `true` when the provider never attempted the request.
    ///
    /// Budget exhaustion and unsupported operations are skips; everything
    /// else means the vendor was contacted (or tried to be) and failed.
    ///
    /// # Examples
    ///
    /// ```
    /// use quantpm_market_data::errors::MarketDataError;
    ///
    /// let error = MarketDataError::BudgetExhausted { provider: "ALPHA_VANTAGE".to_string(), limit: 25 };
    /// assert!(error.is_skip());
    ///
    /// let error = MarketDataError::SymbolNotFound("INVALID".to_string());
    /// assert!(!error.is_skip());
    /// ```
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::BudgetExhausted { .. } | Self::NotSupported { .. }
        )
    }

    /// Shorthand for a [`MarketDataError::ProviderError`].
    pub fn provider(provider: &str, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}
