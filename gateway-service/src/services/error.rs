use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures the proxy surface can produce. Every variant converts to an
/// HTTP response at the dispatcher boundary so no error escapes to the
/// platform's default handler.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("deployment not found")]
    TargetNotFound,

    #[error("runtime proxy is disabled")]
    FeatureDisabled,

    #[error("no upstream credential available")]
    AuthenticationUnavailable,

    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("upstream request failed: {0}")]
    UpstreamUnreachable(String),

    #[error("missing configuration: {0}")]
    ConfigurationMissing(&'static str),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::TargetNotFound => {
                (StatusCode::NOT_FOUND, "Deployment not found").into_response()
            }
            GatewayError::FeatureDisabled => {
                (StatusCode::FORBIDDEN, "Runtime proxy is disabled").into_response()
            }
            // Exchange rejections degrade to a missing credential; the
            // detail stays in the server-side logs.
            GatewayError::AuthenticationUnavailable | GatewayError::TokenExchangeFailed(_) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Unauthorized",
                    "message": "No valid credentials found for the upstream deployment",
                })),
            )
                .into_response(),
            GatewayError::UpstreamUnreachable(message) => (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "message": message })),
            )
                .into_response(),
            GatewayError::ConfigurationMissing(name) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": format!("Missing configuration: {}", name) })),
            )
                .into_response(),
        }
    }
}
