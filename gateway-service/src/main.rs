use dotenvy::dotenv;
use gateway_service::config::GatewayConfig;
use gateway_service::services::identity::{HttpIdentityProvider, IdentityProvider};
use gateway_service::services::token_exchange::{HttpTokenExchanger, TokenExchanger};
use gateway_service::startup::build_router;
use gateway_service::AppState;
use service_core::observability::init_tracing;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = GatewayConfig::from_env().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        &configuration.service_name,
        &configuration.log_level,
        configuration.otlp_endpoint.as_deref(),
    );

    gateway_service::services::metrics::init_metrics();

    let identity: Arc<dyn IdentityProvider> =
        Arc::new(HttpIdentityProvider::new(configuration.identity.clone()));
    let exchanger: Arc<dyn TokenExchanger> =
        Arc::new(HttpTokenExchanger::new(&configuration.mcp.server_url));

    let address = format!(
        "{}:{}",
        configuration.common.host, configuration.common.port
    );

    let state = AppState::new(configuration, identity, exchanger);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!("Starting gateway-service on {}", address);
    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
