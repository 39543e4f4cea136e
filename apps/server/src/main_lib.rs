use std::sync::Arc;

use quantpm_core::{ConfigSource, InstrumentCatalog, LogFormat, Settings};
use quantpm_market_data::ProviderAggregator;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub struct AppState {
    pub aggregator: Arc<ProviderAggregator>,
    pub settings: Settings,
    pub instruments: InstrumentCatalog,
}

impl AppState {
    pub fn new(aggregator: ProviderAggregator, config: &ConfigSource) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            settings: config.settings.clone(),
            instruments: config.instruments.clone(),
        }
    }

    pub fn watchlist(&self) -> Vec<String> {
        self.instruments.watchlist()
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `LOG_LEVEL`; `DEBUG`
/// forces debug output.
pub fn init_tracing(settings: &Settings) {
    let default_level = if settings.debug {
        "debug".to_string()
    } else {
        settings.log_level.to_lowercase()
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_level));
    let registry = tracing_subscriber::registry().with(filter);
    match settings.log_format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init(),
    }
}

pub fn build_state(config: &ConfigSource) -> anyhow::Result<Arc<AppState>> {
    let aggregator = ProviderAggregator::from_config(&config.settings.aggregator_config())?;
    config.warn_unusable_providers();
    info!(
        "Loaded {} instruments into the watch-list",
        config.watchlist().len()
    );
    Ok(Arc::new(AppState::new(aggregator, config)))
}

/// Check every provider once and log the result.
pub async fn log_provider_status(state: &AppState) {
    let status = state.aggregator.check_providers().await;
    for (provider, available) in &status {
        if *available {
            info!("Provider {} is available", provider);
        } else {
            warn!("Provider {} is unavailable", provider);
        }
    }
}
