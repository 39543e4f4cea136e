//! Fixed call budget for providers with a hard quota.
//!
//! A budget counts every outbound request a provider makes (single quote,
//! batch item, historical fetch) against a ceiling. It is advisory and lives
//! for the process lifetime only: there is no wall-clock window. Whoever owns
//! the quota period (a scheduler, an operator) calls [`RateBudget::reset`].

use std::sync::atomic::{AtomicU32, Ordering};

use log::{debug, warn};

/// Default ceiling for the Alpha Vantage free tier (calls per day).
pub const DEFAULT_DAILY_CALL_LIMIT: u32 = 25;

/// Atomic call counter with a fixed ceiling.
///
/// Consumption uses compare-and-swap, so concurrent callers can never push
/// the counter past the ceiling.
#[derive(Debug)]
pub struct RateBudget {
    provider: &'static str,
    used: AtomicU32,
    limit: u32,
}

impl RateBudget {
    pub fn new(provider: &'static str, limit: u32) -> Self {
        Self {
            provider,
            used: AtomicU32::new(0),
            limit,
        }
    }

    /// Take one call from the budget.
    ///
    /// Returns `false` without touching the counter once the ceiling is
    /// reached.
    pub fn try_consume(&self) -> bool {
        let consumed = self
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                (used < self.limit).then_some(used + 1)
            })
            .is_ok();

        if consumed {
            debug!(
                "Call budget for '{}': {}/{} ({} left)",
                self.provider,
                self.used(),
                self.limit,
                self.remaining()
            );
        } else {
            warn!(
                "Call budget for '{}' exhausted ({} calls)",
                self.provider, self.limit
            );
        }
        consumed
    }

    /// True once no calls are left.
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used())
    }

    /// Start a new quota period.
    pub fn reset(&self) {
        let previous = self.used.swap(0, Ordering::AcqRel);
        debug!(
            "Call budget for '{}' reset ({} calls used)",
            self.provider, previous
        );
    }
}
