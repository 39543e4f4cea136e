//! Attempt tracking for the fallback chain.

use crate::errors::MarketDataError;
use crate::models::ProviderId;

/// Why a provider was not attempted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The provider's call budget was already used up.
    BudgetExhausted { limit: u32 },

    /// The provider cannot serve this request (interval, endpoint).
    NotSupported { operation: String },
}

impl SkipReason {
    /// Map a skip-class error to its reason.
    pub fn from_error(error: &MarketDataError) -> Option<Self> {
        match error {
            MarketDataError::BudgetExhausted { limit, .. } => {
                Some(Self::BudgetExhausted { limit: *limit })
            }
            MarketDataError::NotSupported { operation, .. } => Some(Self::NotSupported {
                operation: operation.clone(),
            }),
            _ => None,
        }
    }
}

/// Record of a single provider attempt during a fetch.
#[derive(Clone, Debug)]
pub struct ProviderAttempt {
    pub provider_id: ProviderId,
    pub skipped: Option<SkipReason>,
    pub error: Option<String>,
    pub success: bool,
}

/// Per-provider trail of one aggregated fetch.
///
/// Lets callers tell "no provider had data" apart from "no provider was
/// attempted".
#[derive(Clone, Debug, Default)]
pub struct FetchDiagnostics {
    pub attempts: Vec<ProviderAttempt>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self {
            attempts: Vec::new(),
        }
    }

    pub fn record_skip(&mut self, provider_id: ProviderId, reason: SkipReason) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            skipped: Some(reason),
            error: None,
            success: false,
        });
    }

    pub fn record_error(&mut self, provider_id: ProviderId, error: String) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            skipped: None,
            error: Some(error),
            success: false,
        });
    }

    /// Record a failed call, classifying it as a skip when nothing was sent.
    pub fn record_failure(&mut self, provider_id: ProviderId, error: &MarketDataError) {
        match SkipReason::from_error(error) {
            Some(reason) => self.record_skip(provider_id, reason),
            None => self.record_error(provider_id, error.to_string()),
        }
    }

    pub fn record_success(&mut self, provider_id: ProviderId) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            skipped: None,
            error: None,
            success: true,
        });
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        self.attempts
            .iter()
            .map(|a| {
                if a.success {
                    format!("{}: SUCCESS", a.provider_id)
                } else if let Some(skip) = &a.skipped {
                    format!("{}: SKIPPED ({:?})", a.provider_id, skip)
                } else if let Some(err) = &a.error {
                    format!("{}: ERROR ({})", a.provider_id, err)
                } else {
                    format!("{}: NO DATA", a.provider_id)
                }
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Check if any provider succeeded.
    pub fn has_success(&self) -> bool {
        self.attempts.iter().any(|a| a.success)
    }

    /// True when at least one provider actually contacted its vendor.
    pub fn was_attempted(&self) -> bool {
        self.attempts.iter().any(|a| a.skipped.is_none())
    }

    /// Get all skip reasons.
    pub fn skip_reasons(&self) -> Vec<(&ProviderId, &SkipReason)> {
        self.attempts
            .iter()
            .filter_map(|a| a.skipped.as_ref().map(|s| (&a.provider_id, s)))
            .collect()
    }

    /// Get all errors.
    pub fn errors(&self) -> Vec<(&ProviderId, &str)> {
        self.attempts
            .iter()
            .filter_map(|a| a.error.as_ref().map(|e| (&a.provider_id, e.as_str())))
            .collect()
    }

    /// Record a provider that answered but had nothing usable.
    pub(crate) fn record_no_data(&mut self, provider_id: ProviderId) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            skipped: None,
            error: None,
            success: false,
        });
    }
}
