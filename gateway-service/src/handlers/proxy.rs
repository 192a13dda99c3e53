//! Credential-aware proxy to the agent-runtime deployments.
//!
//! Two variants share one dispatch flow: the MCP proxy resolves the full
//! credential chain and may mint a token via exchange, the runtime proxy
//! is feature-flag gated and only accepts UUID deployment ids.

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{header, HeaderValue, Method},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use metrics::counter;
use serde::Deserialize;
use serde_json::Value;
use service_core::observability::inject_trace_context;
use uuid::Uuid;

use crate::config::Environment;
use crate::models::Deployment;
use crate::services::credentials::{Credential, CredentialResolver, ACCESS_TOKEN_COOKIE};
use crate::services::error::GatewayError;
use crate::AppState;

/// Lifetime of the persisted session cookie. Fixed, independent of the
/// `expires_in` the exchange endpoint reports.
const PROXY_COOKIE_MAX_AGE_SECONDS: i64 = 3600;

/// Path parameters for both proxy mounts. The wildcard is absent when
/// the request targets the deployment root.
#[derive(Deserialize)]
pub struct ProxyPath {
    pub deployment_id: String,
    #[serde(default)]
    pub path: Option<String>,
}

struct ProxyVariant {
    name: &'static str,
    /// Appended to the deployment base URL ahead of the forwarded path.
    upstream_suffix: &'static str,
    /// The runtime proxy only accepts syntactically valid UUID ids; an
    /// invalid id behaves exactly like an unknown one.
    require_uuid: bool,
}

const MCP_PROXY: ProxyVariant = ProxyVariant {
    name: "mcp",
    upstream_suffix: "/mcp",
    require_uuid: false,
};

const RUNTIME_PROXY: ProxyVariant = ProxyVariant {
    name: "runtime",
    upstream_suffix: "",
    require_uuid: true,
};

/// Dispatch phases, in order. A terminal response can be emitted from
/// any phase.
#[derive(Clone, Copy)]
enum Phase {
    ResolvingTarget,
    ResolvingCredential,
    Forwarding,
    Relaying,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::ResolvingTarget => "resolving_target",
            Phase::ResolvingCredential => "resolving_credential",
            Phase::Forwarding => "forwarding",
            Phase::Relaying => "relaying",
        }
    }
}

pub async fn mcp_proxy(
    State(state): State<AppState>,
    Path(path): Path<ProxyPath>,
    req: Request,
) -> Response {
    let resolver = state.mcp_credentials.clone();
    dispatch(&state, &MCP_PROXY, &resolver, path, req).await
}

pub async fn runtime_proxy(
    State(state): State<AppState>,
    Path(path): Path<ProxyPath>,
    req: Request,
) -> Response {
    // Flag off means 403 regardless of path validity or credentials,
    // before any other work.
    if !state.config.runtime_proxy.enabled {
        tracing::debug!(variant = RUNTIME_PROXY.name, "runtime proxy is disabled");
        return GatewayError::FeatureDisabled.into_response();
    }

    let resolver = state.runtime_credentials.clone();
    dispatch(&state, &RUNTIME_PROXY, &resolver, path, req).await
}

async fn dispatch(
    state: &AppState,
    variant: &ProxyVariant,
    resolver: &CredentialResolver,
    path: ProxyPath,
    req: Request,
) -> Response {
    let deployment_id = path.deployment_id.clone();

    let response = match run(state, variant, resolver, path, req).await {
        Ok(response) => response,
        Err(e) => {
            tracing::info!(
                variant = variant.name,
                deployment_id = %deployment_id,
                error = %e,
                "proxy request rejected"
            );
            e.into_response()
        }
    };

    let labels = [
        ("variant", variant.name.to_string()),
        ("status", response.status().as_u16().to_string()),
    ];
    counter!("gateway_proxy_requests_total", &labels).increment(1);

    response
}

async fn run(
    state: &AppState,
    variant: &ProxyVariant,
    resolver: &CredentialResolver,
    path: ProxyPath,
    req: Request,
) -> Result<Response, GatewayError> {
    tracing::debug!(
        variant = variant.name,
        phase = Phase::ResolvingTarget.as_str(),
        deployment_id = %path.deployment_id,
    );
    let deployment = resolve_target(state, variant, &path.deployment_id)?;

    // Base URL the credential is scoped to; also the exchange `resource`.
    let resource = format!(
        "{}{}",
        deployment.deployment_url.trim_end_matches('/'),
        variant.upstream_suffix
    );

    tracing::debug!(
        variant = variant.name,
        phase = Phase::ResolvingCredential.as_str(),
        deployment_id = %deployment.id,
    );
    let credential = resolver.resolve(req.headers(), &resource).await?;

    tracing::debug!(
        variant = variant.name,
        phase = Phase::Forwarding.as_str(),
        deployment_id = %deployment.id,
    );
    let upstream = forward(&state.http, &resource, path.path, req, &credential).await?;

    tracing::debug!(
        variant = variant.name,
        phase = Phase::Relaying.as_str(),
        deployment_id = %deployment.id,
        status = upstream.status().as_u16(),
    );
    let secure_cookie = state.config.environment == Environment::Prod;
    relay(upstream, &credential, secure_cookie).await
}

fn resolve_target<'a>(
    state: &'a AppState,
    variant: &ProxyVariant,
    deployment_id: &str,
) -> Result<&'a Deployment, GatewayError> {
    if variant.require_uuid && Uuid::parse_str(deployment_id).is_err() {
        tracing::debug!(deployment_id, "rejecting non-UUID deployment id");
        return Err(GatewayError::TargetNotFound);
    }

    state
        .registry
        .find_by_id(deployment_id)
        .ok_or(GatewayError::TargetNotFound)
}

/// Forward the inbound request to the upstream deployment. Headers are
/// copied except `Host`; `Authorization` and `Accept` are overwritten.
async fn forward(
    client: &reqwest::Client,
    resource: &str,
    rest: Option<String>,
    req: Request,
    credential: &Credential,
) -> Result<reqwest::Response, GatewayError> {
    let method = req.method().clone();
    let query = req
        .uri()
        .query()
        .map(|q| format!("?{}", q))
        .unwrap_or_default();
    let rest = rest.map(|p| format!("/{}", p)).unwrap_or_default();
    let url = format!("{}{}{}", resource, rest, query);

    let mut headers = req.headers().clone();
    headers.remove(header::HOST);
    let bearer = HeaderValue::from_str(&format!("Bearer {}", credential.bearer())).map_err(|_| {
        tracing::warn!("resolved credential is not a valid header value");
        GatewayError::AuthenticationUnavailable
    })?;
    headers.insert(header::AUTHORIZATION, bearer);
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    inject_trace_context(&mut headers);

    let mut builder = client.request(method.clone(), &url).headers(headers);
    if method != Method::GET && method != Method::HEAD {
        let body = axum::body::to_bytes(req.into_body(), usize::MAX)
            .await
            .map_err(|e| GatewayError::UpstreamUnreachable(e.to_string()))?;
        builder = builder.body(body);
    }

    builder.send().await.map_err(|e| {
        tracing::error!(error = %e, url = %url, "upstream fetch failed");
        GatewayError::UpstreamUnreachable(e.to_string())
    })
}

/// Relay the upstream response: JSON body when parseable, raw text
/// otherwise; status and headers pass through. A token minted via
/// exchange is persisted as a session cookie so later requests skip the
/// exchange step.
async fn relay(
    upstream: reqwest::Response,
    credential: &Credential,
    secure_cookie: bool,
) -> Result<Response, GatewayError> {
    let status = upstream.status();

    let mut headers = upstream.headers().clone();
    // Framing is recomputed for the re-encoded body.
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::TRANSFER_ENCODING);

    let bytes = upstream
        .bytes()
        .await
        .map_err(|e| GatewayError::UpstreamUnreachable(e.to_string()))?;

    let mut response: Response<Body> = match serde_json::from_slice::<Value>(&bytes) {
        Ok(json) => (status, Json(json)).into_response(),
        Err(_) => (status, String::from_utf8_lossy(&bytes).into_owned()).into_response(),
    };

    // Upstream headers replace the defaults wholesale; keep our
    // content-type only when the upstream did not send one.
    if !headers.contains_key(header::CONTENT_TYPE) {
        if let Some(content_type) = response.headers().get(header::CONTENT_TYPE).cloned() {
            headers.insert(header::CONTENT_TYPE, content_type);
        }
    }
    *response.headers_mut() = headers;

    if let Some(token) = credential.exchanged() {
        let cookie = Cookie::build((ACCESS_TOKEN_COOKIE, token.access_token.clone()))
            .path("/")
            .http_only(false)
            .secure(secure_cookie)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(PROXY_COOKIE_MAX_AGE_SECONDS))
            .build();

        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => {
                tracing::warn!(error = %e, "exchanged token is not a valid cookie value");
            }
        }
    }

    Ok(response)
}

/// Method sets for the two mounts. The MCP surface additionally accepts
/// HEAD and OPTIONS for protocol preflights.
pub mod methods {
    use axum::routing::MethodFilter;

    pub fn mcp() -> MethodFilter {
        base()
            .or(MethodFilter::HEAD)
            .or(MethodFilter::OPTIONS)
    }

    pub fn runtime() -> MethodFilter {
        base()
    }

    fn base() -> MethodFilter {
        MethodFilter::GET
            .or(MethodFilter::POST)
            .or(MethodFilter::PUT)
            .or(MethodFilter::PATCH)
            .or(MethodFilter::DELETE)
    }
}
