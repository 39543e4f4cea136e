//! Rate limiting metadata for providers.

use std::time::Duration;

/// Rate limiting configuration for a provider.
///
/// Describes how aggressively a provider may be called. `max_concurrency`
/// bounds batch fan-out; the other fields are informational.
#[derive(Clone, Debug)]
pub struct RateLimit {
    /// Maximum requests allowed per minute.
    pub requests_per_minute: u32,

    /// Maximum concurrent requests to this provider.
    pub max_concurrency: usize,

    /// Minimum delay between requests.
    pub min_delay: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            max_concurrency: 5,
            min_delay: Duration::from_millis(100),
        }
    }
}
