use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use quantpm_market_data::ProviderRecord;
use serde::Serialize;
use tracing::info;

use crate::main_lib::AppState;

#[derive(Serialize)]
struct ProvidersResponse {
    timestamp: DateTime<Utc>,
    providers: BTreeMap<String, bool>,
    records: Vec<ProviderRecord>,
}

/// Check every provider, then report status together with budget usage.
async fn check_providers(State(state): State<Arc<AppState>>) -> Json<ProvidersResponse> {
    let providers = state.aggregator.check_providers().await;
    Json(ProvidersResponse {
        timestamp: Utc::now(),
        providers,
        records: state.aggregator.provider_records(),
    })
}

#[derive(Serialize)]
struct BudgetResetResponse {
    timestamp: DateTime<Utc>,
    records: Vec<ProviderRecord>,
}

async fn reset_budgets(State(state): State<Arc<AppState>>) -> Json<BudgetResetResponse> {
    state.aggregator.reset_budgets();
    info!("Provider call budgets reset on request");
    Json(BudgetResetResponse {
        timestamp: Utc::now(),
        records: state.aggregator.provider_records(),
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/providers", get(check_providers))
        .route("/providers/budgets/reset", post(reset_budgets))
}
