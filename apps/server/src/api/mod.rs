use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, http::HeaderValue, routing::get, Json, Router};
use quantpm_core::Settings;
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::main_lib::AppState;

pub mod market_data;
pub mod providers;

#[derive(Serialize)]
struct Endpoints {
    dashboard: &'static str,
    market_data: &'static str,
    providers: &'static str,
}

#[derive(Serialize)]
struct RootResponse {
    app: String,
    version: String,
    status: &'static str,
    endpoints: Endpoints,
}

async fn root(State(state): State<Arc<AppState>>) -> Json<RootResponse> {
    Json(RootResponse {
        app: state.settings.app_name.clone(),
        version: state.settings.app_version.clone(),
        status: "running",
        endpoints: Endpoints {
            dashboard: "/api/v1/dashboard",
            market_data: "/api/v1/quotes",
            providers: "/api/v1/providers",
        },
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    providers: BTreeMap<String, bool>,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let providers = state.aggregator.check_providers().await;
    Json(HealthResponse {
        status: "healthy",
        providers,
    })
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    if settings.cors_allow.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = settings
            .cors_allow
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

pub fn app_router(state: Arc<AppState>, settings: &Settings) -> Router {
    let api = Router::new()
        .merge(market_data::router())
        .merge(providers::router());

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1", api)
        .nest_service("/static", ServeDir::new(&settings.static_dir))
        .with_state(state)
        .layer(cors_layer(settings))
        .layer(TimeoutLayer::new(settings.request_timeout))
        .layer(TraceLayer::new_for_http())
}
