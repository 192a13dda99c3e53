use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use service_core::observability::inject_trace_context;

use crate::config::IdentityConfig;
use crate::utils::{bearer_token, cookie_value};

/// A user with a live identity-provider session.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Result of a session check: the authenticated user, if any, plus any
/// refreshed session cookies the identity provider wants set on the
/// client. The access gate must carry these onto every response.
#[derive(Debug, Default)]
pub struct SessionCheck {
    pub user: Option<SessionUser>,
    pub refresh_cookies: Vec<HeaderValue>,
}

/// Session-checking capability consumed by the access gate. Injected so
/// tests can substitute a stub.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn get_session(&self, headers: &HeaderMap) -> SessionCheck;
}

/// Identity provider backed by the configured HTTP endpoint. A failed
/// or unreachable check degrades to "no user" rather than failing the
/// request; the gate then applies its unauthenticated behavior.
pub struct HttpIdentityProvider {
    client: Client,
    config: IdentityConfig,
}

impl HttpIdentityProvider {
    pub fn new(config: IdentityConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn identity_token(&self, headers: &HeaderMap) -> Option<String> {
        bearer_token(headers).or_else(|| cookie_value(headers, &self.config.session_cookie))
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn get_session(&self, headers: &HeaderMap) -> SessionCheck {
        let Some(token) = self.identity_token(headers) else {
            return SessionCheck::default();
        };

        let url = format!("{}/auth/v1/user", self.config.url.trim_end_matches('/'));

        let mut outbound = reqwest::header::HeaderMap::new();
        inject_trace_context(&mut outbound);

        let response = self
            .client
            .get(&url)
            .headers(outbound)
            .header("apikey", self.config.anon_key.expose_secret())
            .bearer_auth(&token)
            .send()
            .await;

        match response {
            Ok(res) if res.status().is_success() => {
                let refresh_cookies = res
                    .headers()
                    .get_all(reqwest::header::SET_COOKIE)
                    .iter()
                    .cloned()
                    .collect();

                match res.json::<SessionUser>().await {
                    Ok(user) => SessionCheck {
                        user: Some(user),
                        refresh_cookies,
                    },
                    Err(e) => {
                        tracing::error!(error = %e, "identity provider returned an unreadable user");
                        SessionCheck::default()
                    }
                }
            }
            Ok(res) => {
                tracing::debug!(status = %res.status(), "session check rejected");
                SessionCheck::default()
            }
            Err(e) => {
                tracing::error!(error = %e, "identity provider unreachable");
                SessionCheck::default()
            }
        }
    }
}
