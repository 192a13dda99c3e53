use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Full gateway configuration, loaded once at startup and carried in
/// `AppState`. Components never read the environment themselves.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    /// Raw `DEPLOYMENTS` JSON. Parsed by the registry, which tolerates
    /// absent or malformed values.
    pub deployments_json: Option<String>,
    pub runtime_proxy: RuntimeProxyConfig,
    pub mcp: McpConfig,
    pub identity: IdentityConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct RuntimeProxyConfig {
    pub enabled: bool,
    pub api_key: Option<Secret<String>>,
}

#[derive(Debug, Clone)]
pub struct McpConfig {
    /// Base URL of the MCP auth server hosting the token-exchange
    /// endpoint.
    pub server_url: String,
    /// Optional static token blob, JSON with an `access_token` field.
    pub tokens_blob: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub url: String,
    pub anon_key: Secret<String>,
    /// Cookie the frontend stores the identity session token in.
    pub session_cookie: String,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = GatewayConfig {
            common,
            environment,
            service_name: get_env("SERVICE_NAME", Some("gateway-service"), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            deployments_json: env::var("DEPLOYMENTS").ok(),
            runtime_proxy: RuntimeProxyConfig {
                enabled: get_env("ENABLE_RUNTIME_PROXY", Some("false"), is_prod)?
                    .parse()
                    .unwrap_or(false),
                api_key: env::var("RUNTIME_API_KEY").ok().map(Secret::new),
            },
            mcp: McpConfig {
                server_url: get_env("MCP_SERVER_URL", Some("http://localhost:8000"), is_prod)?,
                tokens_blob: env::var("MCP_TOKENS").ok(),
            },
            identity: IdentityConfig {
                url: get_env("IDENTITY_URL", Some("http://localhost:54321"), is_prod)?,
                anon_key: Secret::new(get_env("IDENTITY_ANON_KEY", Some("dev-anon-key"), is_prod)?),
                session_cookie: get_env(
                    "IDENTITY_SESSION_COOKIE",
                    Some("sb-access-token"),
                    is_prod,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.mcp.server_url.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "MCP_SERVER_URL must not be empty"
            )));
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
