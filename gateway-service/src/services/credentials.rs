use std::sync::Arc;

use axum::http::HeaderMap;
use secrecy::{ExposeSecret, Secret};

use crate::models::AccessToken;
use crate::services::error::GatewayError;
use crate::services::token_exchange::TokenExchanger;
use crate::utils::{bearer_token, cookie_value};

/// Header and cookie the frontend uses to replay a previously issued
/// access token.
pub const ACCESS_TOKEN_HEADER: &str = "x-mcp-access-token";
pub const ACCESS_TOKEN_COOKIE: &str = "X-MCP-Access-Token";

/// An upstream credential together with its provenance. Only tokens
/// minted through exchange are written back to the client as a cookie.
pub enum Credential {
    /// Administrative service credential from configuration.
    Service(Secret<String>),
    /// Token the caller supplied directly, via header or cookie.
    Direct(Secret<String>),
    /// Token minted by token exchange during this request.
    Exchanged(AccessToken),
}

impl Credential {
    pub fn bearer(&self) -> &str {
        match self {
            Credential::Service(key) => key.expose_secret(),
            Credential::Direct(token) => token.expose_secret(),
            Credential::Exchanged(token) => &token.access_token,
        }
    }

    pub fn exchanged(&self) -> Option<&AccessToken> {
        match self {
            Credential::Exchanged(token) => Some(token),
            _ => None,
        }
    }
}

/// Ordered, per-request credential resolution. One instance exists per
/// proxy variant; they differ only in the configured service credential.
pub struct CredentialResolver {
    service_credential: Option<Secret<String>>,
    identity_cookie: String,
    exchanger: Arc<dyn TokenExchanger>,
}

impl CredentialResolver {
    pub fn new(
        service_credential: Option<Secret<String>>,
        identity_cookie: String,
        exchanger: Arc<dyn TokenExchanger>,
    ) -> Self {
        Self {
            service_credential,
            identity_cookie,
            exchanger,
        }
    }

    /// Build a service credential from a static JSON token blob. A
    /// malformed blob is logged and treated as absent, never fatal.
    pub fn service_credential_from_blob(blob: Option<&str>) -> Option<Secret<String>> {
        let blob = blob?;

        match serde_json::from_str::<serde_json::Value>(blob) {
            Ok(value) => match value.get("access_token").and_then(|v| v.as_str()) {
                Some(token) => Some(Secret::new(token.to_string())),
                None => {
                    tracing::warn!("static token blob has no access_token field, ignoring it");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse static token blob, ignoring it");
                None
            }
        }
    }

    /// Resolve the upstream credential for one request. First match
    /// wins: direct token, configured service credential, then token
    /// exchange against the caller's identity token.
    pub async fn resolve(
        &self,
        headers: &HeaderMap,
        resource: &str,
    ) -> Result<Credential, GatewayError> {
        let direct = headers
            .get(ACCESS_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|token| token.to_string())
            .or_else(|| cookie_value(headers, ACCESS_TOKEN_COOKIE));
        if let Some(token) = direct {
            return Ok(Credential::Direct(Secret::new(token)));
        }

        if let Some(key) = &self.service_credential {
            return Ok(Credential::Service(key.clone()));
        }

        let identity_token =
            bearer_token(headers).or_else(|| cookie_value(headers, &self.identity_cookie));
        if let Some(identity_token) = identity_token {
            match self.exchanger.exchange(&identity_token, resource).await {
                Ok(Some(token)) => return Ok(Credential::Exchanged(token)),
                Ok(None) => {
                    tracing::warn!(resource = %resource, "token exchange yielded no token");
                }
                Err(e) => return Err(GatewayError::UpstreamUnreachable(e.to_string())),
            }
        }

        Err(GatewayError::AuthenticationUnavailable)
    }
}
