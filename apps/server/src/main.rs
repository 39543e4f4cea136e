use quantpm_core::{ConfigSource, Settings};
use quantpm_server::{
    api::app_router, build_state, init_tracing, log_provider_status,
    scheduler::start_budget_reset_scheduler,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    init_tracing(&settings);
    tracing::info!(
        "Starting {} v{}",
        settings.app_name,
        settings.app_version
    );

    let config = ConfigSource::with_settings(settings)?;
    let state = build_state(&config)?;
    log_provider_status(&state).await;
    start_budget_reset_scheduler(state.clone());

    let router = app_router(state, &config.settings);
    let listen_addr = config.settings.listen_addr();
    tracing::info!("Listening on {}", listen_addr);
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
