use async_trait::async_trait;
use reqwest::Client;
use service_core::observability::inject_trace_context;

use crate::models::AccessToken;

pub const EXCHANGE_CLIENT_ID: &str = "mcp_default";
pub const EXCHANGE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
pub const EXCHANGE_SUBJECT_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:access_token";

/// Mints a scoped access token from an end-user identity token.
/// Injected so tests can count invocations and control the outcome.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// A protocol rejection (non-2xx, body without an access token)
    /// yields `Ok(None)` and the caller treats the credential as absent.
    /// Transport failures are `Err` and surface as a 502-class proxy
    /// failure. Single attempt, no retry.
    async fn exchange(
        &self,
        identity_token: &str,
        resource: &str,
    ) -> anyhow::Result<Option<AccessToken>>;
}

/// Token exchange against the MCP auth server's `/oauth/token` endpoint.
pub struct HttpTokenExchanger {
    client: Client,
    token_endpoint: String,
}

impl HttpTokenExchanger {
    pub fn new(server_url: &str) -> Self {
        Self {
            client: Client::new(),
            token_endpoint: format!("{}/oauth/token", server_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl TokenExchanger for HttpTokenExchanger {
    async fn exchange(
        &self,
        identity_token: &str,
        resource: &str,
    ) -> anyhow::Result<Option<AccessToken>> {
        let params = [
            ("client_id", EXCHANGE_CLIENT_ID),
            ("subject_token", identity_token),
            ("grant_type", EXCHANGE_GRANT_TYPE),
            ("resource", resource),
            ("subject_token_type", EXCHANGE_SUBJECT_TOKEN_TYPE),
        ];

        let mut headers = reqwest::header::HeaderMap::new();
        inject_trace_context(&mut headers);

        let response = self
            .client
            .post(&self.token_endpoint)
            .headers(headers)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, endpoint = %self.token_endpoint, "token exchange request failed");
                anyhow::anyhow!("token exchange request failed: {}", e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "token exchange rejected");
            return Ok(None);
        }

        match response.json::<AccessToken>().await {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                tracing::error!(error = %e, "token exchange response had no access_token");
                Ok(None)
            }
        }
    }
}
