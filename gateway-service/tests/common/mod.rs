//! Test helpers for gateway-service integration tests.
//!
//! Spawns a recording stub upstream on an ephemeral port and wires the
//! router with stub identity/token-exchange capabilities so tests can
//! observe exactly what the proxy does.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use gateway_service::config::{
    Environment, GatewayConfig, IdentityConfig, McpConfig, RuntimeProxyConfig,
};
use gateway_service::models::AccessToken;
use gateway_service::services::identity::{IdentityProvider, SessionCheck, SessionUser};
use gateway_service::services::token_exchange::TokenExchanger;
use gateway_service::startup::build_router;
use gateway_service::AppState;
use secrecy::Secret;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::util::ServiceExt;

/// Deployment id used by the default test registry. A valid UUID so the
/// runtime proxy accepts it too.
pub const DEPLOYMENT_ID: &str = "7b2886e1-50f2-4cd9-9440-b5cbbb9a8d9e";

/// One request as seen by the stub upstream.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    /// Path including the query string.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Network-call spy over the stub upstream.
#[derive(Clone, Default)]
pub struct UpstreamSpy {
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl UpstreamSpy {
    pub fn hit_count(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[derive(Clone)]
pub enum UpstreamBody {
    Json(Value),
    Text(String),
}

/// Spawn a stub upstream server answering every request with the given
/// status and body while recording what it received.
pub async fn spawn_upstream(status: u16, body: UpstreamBody) -> (String, UpstreamSpy) {
    let spy = UpstreamSpy::default();
    let recorder = spy.clone();

    let app = Router::new().fallback(move |req: Request<Body>| {
        let recorder = recorder.clone();
        let body = body.clone();
        async move {
            recorder.hits.fetch_add(1, Ordering::SeqCst);

            let (parts, inbound_body) = req.into_parts();
            let bytes = axum::body::to_bytes(inbound_body, usize::MAX)
                .await
                .unwrap_or_default();
            let path = parts
                .uri
                .path_and_query()
                .map(|pq| pq.to_string())
                .unwrap_or_default();
            recorder.requests.lock().unwrap().push(RecordedRequest {
                method: parts.method.to_string(),
                path,
                headers: parts.headers,
                body: bytes.to_vec(),
            });

            let status = StatusCode::from_u16(status).unwrap();
            match body {
                UpstreamBody::Json(value) => (status, axum::Json(value)).into_response(),
                UpstreamBody::Text(text) => (status, text).into_response(),
            }
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind stub upstream to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (format!("http://{}", addr), spy)
}

/// A URL nothing listens on, for unreachable-upstream tests.
pub async fn dead_upstream_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();
    drop(listener);

    format!("http://{}", addr)
}

pub fn deployments_json(id: &str, url: &str) -> String {
    json!([{
        "id": id,
        "name": "primary",
        "deploymentUrl": url,
        "isDefault": true,
        "defaultGraphId": "agent",
        "primaryGraphId": "agent"
    }])
    .to_string()
}

pub struct StubIdentity {
    pub user: Option<SessionUser>,
    pub refresh_cookies: Vec<HeaderValue>,
}

impl StubIdentity {
    pub fn signed_in() -> Self {
        Self {
            user: Some(SessionUser {
                id: "user-1".to_string(),
                email: Some("dev@example.com".to_string()),
            }),
            refresh_cookies: Vec::new(),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            user: None,
            refresh_cookies: Vec::new(),
        }
    }
}

#[async_trait]
impl IdentityProvider for StubIdentity {
    async fn get_session(&self, _headers: &HeaderMap) -> SessionCheck {
        SessionCheck {
            user: self.user.clone(),
            refresh_cookies: self.refresh_cookies.clone(),
        }
    }
}

pub struct StubExchanger {
    pub calls: Arc<AtomicUsize>,
    pub token: Option<AccessToken>,
}

#[async_trait]
impl TokenExchanger for StubExchanger {
    async fn exchange(
        &self,
        _identity_token: &str,
        _resource: &str,
    ) -> anyhow::Result<Option<AccessToken>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.token.clone())
    }
}

pub struct TestAppConfig {
    pub signed_in: bool,
    pub refresh_cookies: Vec<&'static str>,
    pub runtime_proxy_enabled: bool,
    pub runtime_api_key: Option<&'static str>,
    pub mcp_tokens_blob: Option<&'static str>,
    pub exchange_token: Option<&'static str>,
    pub upstream_status: u16,
    pub upstream_body: UpstreamBody,
    /// Id registered for the stub upstream deployment.
    pub deployment_id: &'static str,
    /// Overrides the default single-deployment registry when set.
    pub deployments_json: Option<String>,
}

impl Default for TestAppConfig {
    fn default() -> Self {
        Self {
            signed_in: true,
            refresh_cookies: Vec::new(),
            runtime_proxy_enabled: true,
            runtime_api_key: None,
            mcp_tokens_blob: None,
            exchange_token: None,
            upstream_status: 200,
            upstream_body: UpstreamBody::Json(json!({ "ok": true })),
            deployment_id: DEPLOYMENT_ID,
            deployments_json: None,
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub upstream: UpstreamSpy,
    pub upstream_url: String,
    pub exchange_calls: Arc<AtomicUsize>,
}

impl TestApp {
    pub async fn spawn(options: TestAppConfig) -> Self {
        let (upstream_url, upstream) =
            spawn_upstream(options.upstream_status, options.upstream_body.clone()).await;

        let deployments = options
            .deployments_json
            .unwrap_or_else(|| deployments_json(options.deployment_id, &upstream_url));

        let config = GatewayConfig {
            common: service_core::config::Config {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            environment: Environment::Dev,
            service_name: "gateway-service-test".to_string(),
            log_level: "debug".to_string(),
            otlp_endpoint: None,
            deployments_json: Some(deployments),
            runtime_proxy: RuntimeProxyConfig {
                enabled: options.runtime_proxy_enabled,
                api_key: options
                    .runtime_api_key
                    .map(|key| Secret::new(key.to_string())),
            },
            mcp: McpConfig {
                server_url: upstream_url.clone(),
                tokens_blob: options.mcp_tokens_blob.map(|blob| blob.to_string()),
            },
            identity: IdentityConfig {
                url: "http://localhost:54321".to_string(),
                anon_key: Secret::new("test-anon-key".to_string()),
                session_cookie: "sb-access-token".to_string(),
            },
        };

        let identity = StubIdentity {
            user: if options.signed_in {
                StubIdentity::signed_in().user
            } else {
                None
            },
            refresh_cookies: options
                .refresh_cookies
                .into_iter()
                .map(HeaderValue::from_static)
                .collect(),
        };

        let exchange_calls = Arc::new(AtomicUsize::new(0));
        let exchanger = StubExchanger {
            calls: exchange_calls.clone(),
            token: options.exchange_token.map(|token| AccessToken {
                access_token: token.to_string(),
                expires_in: 3600,
            }),
        };

        let state = AppState::new(config, Arc::new(identity), Arc::new(exchanger));
        let router = build_router(state);

        TestApp {
            router,
            upstream,
            upstream_url,
            exchange_calls,
        }
    }

    pub fn exchange_count(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    /// Drive one request through the router without binding a port.
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router call failed")
    }
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body")
        .to_vec()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("response body was not JSON")
}
