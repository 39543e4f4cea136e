//! Background scheduler for call budget rollover.
//!
//! Budgeted vendors count their quota per UTC day, so every budget is reset
//! right after UTC midnight.

use std::sync::Arc;

use chrono::{DateTime, Days, Utc};
use tokio::time::Duration;
use tracing::{debug, info};

use crate::main_lib::AppState;

/// Slack after midnight so the reset lands inside the new vendor day.
const RESET_GRACE_SECS: u64 = 5;

/// Time left until the next UTC midnight after `now`.
pub fn until_next_utc_midnight(now: DateTime<Utc>) -> Duration {
    let next_midnight = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc());

    match next_midnight {
        Some(midnight) => (midnight - now).to_std().unwrap_or(Duration::ZERO),
        None => Duration::from_secs(24 * 60 * 60),
    }
}

/// Starts the daily budget reset scheduler.
pub fn start_budget_reset_scheduler(state: Arc<AppState>) {
    tokio::spawn(async move {
        info!("Budget reset scheduler started (daily at 00:00 UTC)");

        loop {
            let wait = until_next_utc_midnight(Utc::now()) + Duration::from_secs(RESET_GRACE_SECS);
            debug!("Next budget reset in {}s", wait.as_secs());
            tokio::time::sleep(wait).await;
            run_budget_reset(&state);
        }
    });
}

fn run_budget_reset(state: &AppState) {
    state.aggregator.reset_budgets();
    let summary: Vec<String> = state
        .aggregator
        .provider_records()
        .iter()
        .filter_map(|r| r.call_limit.map(|limit| format!("{} 0/{}", r.id, limit)))
        .collect();
    info!("Daily call budgets reset: [{}]", summary.join(", "));
}
