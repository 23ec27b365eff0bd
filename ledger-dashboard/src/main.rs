use dotenvy::dotenv;
use ledger_dashboard::config::get_configuration;
use ledger_dashboard::services::backend::BackendClient;
use ledger_dashboard::startup::build_router;
use ledger_dashboard::AppState;
use service_core::observability::logging::init_tracing;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "ledger-dashboard",
        &configuration.telemetry.log_level,
        configuration.telemetry.otlp_endpoint.as_deref(),
    );

    ledger_dashboard::services::metrics::init_metrics();

    let page_size = configuration.backend.payment_page_size;
    let backend = BackendClient::new(configuration.backend.clone())
        .map_err(|e| anyhow::anyhow!("Failed to build backend client: {}", e))?;
    info!(base_url = %backend.base_url(), page_size, "Backend client ready");

    let state = AppState::new(Arc::new(backend), page_size);
    let app = build_router(state);

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!("Starting ledger-dashboard on {}", address);
    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
