pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod registry;
pub mod services;
pub mod startup;
pub mod utils;

use std::sync::Arc;

use config::GatewayConfig;
use registry::DeploymentRegistry;
use services::credentials::CredentialResolver;
use services::identity::IdentityProvider;
use services::token_exchange::TokenExchanger;

/// Shared application state. Everything here is built once at startup
/// and never mutated afterwards.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub registry: Arc<DeploymentRegistry>,
    pub identity: Arc<dyn IdentityProvider>,
    pub runtime_credentials: Arc<CredentialResolver>,
    pub mcp_credentials: Arc<CredentialResolver>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        config: GatewayConfig,
        identity: Arc<dyn IdentityProvider>,
        exchanger: Arc<dyn TokenExchanger>,
    ) -> Self {
        let registry = Arc::new(DeploymentRegistry::from_config(
            config.deployments_json.as_deref(),
        ));

        // The runtime proxy authenticates with the administrative API key,
        // the MCP proxy with the optional static token blob. Everything
        // else about credential resolution is shared.
        let runtime_credentials = Arc::new(CredentialResolver::new(
            config.runtime_proxy.api_key.clone(),
            config.identity.session_cookie.clone(),
            exchanger.clone(),
        ));
        let mcp_credentials = Arc::new(CredentialResolver::new(
            CredentialResolver::service_credential_from_blob(config.mcp.tokens_blob.as_deref()),
            config.identity.session_cookie.clone(),
            exchanger,
        ));

        Self {
            config: Arc::new(config),
            registry,
            identity,
            runtime_credentials,
            mcp_credentials,
            http: reqwest::Client::new(),
        }
    }
}
