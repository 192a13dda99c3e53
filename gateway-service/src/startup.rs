use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, on},
    Router,
};
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    app::{health_check, list_deployments},
    metrics::metrics,
    proxy::{mcp_proxy, methods, runtime_proxy},
};
use crate::middleware::auth::access_gate;
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    let mcp = Router::new()
        .route("/:deployment_id", on(methods::mcp(), mcp_proxy))
        .route("/:deployment_id/*path", on(methods::mcp(), mcp_proxy));

    let runtime = Router::new()
        .route("/:deployment_id", on(methods::runtime(), runtime_proxy))
        .route(
            "/:deployment_id/*path",
            on(methods::runtime(), runtime_proxy),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/api/deployments", get(list_deployments))
        .nest("/api/mcp", mcp)
        .nest("/api/runtime", runtime)
        .layer(from_fn_with_state(state.clone(), access_gate))
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        // Add tracing layer
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
