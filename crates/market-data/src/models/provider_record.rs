use serde::{Deserialize, Serialize};

/// Live view of one configured provider.
///
/// Built by the aggregator on demand; nothing here is persisted across
/// restarts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRecord {
    /// Provider identifier (YAHOO, ALPHA_VANTAGE, ...).
    pub id: String,

    /// Result of the most recent availability check, `None` until checked.
    pub available: Option<bool>,

    /// Outbound calls consumed in the current quota period.
    pub calls_used: u32,

    /// Call ceiling, `None` when the provider is not budgeted.
    pub call_limit: Option<u32>,
}

impl ProviderRecord {
    /// Calls left before the provider short-circuits, `None` when unbudgeted.
    pub fn calls_remaining(&self) -> Option<u32> {
        self.call_limit
            .map(|limit| limit.saturating_sub(self.calls_used))
    }
}
