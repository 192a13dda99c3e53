use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::json;

use crate::AppState;

pub const SIGNIN_PATH: &str = "/signin";
pub const HOME_PATH: &str = "/";

/// Deprecated inbox UI; always bounced home.
const LEGACY_INBOX_PREFIX: &str = "/agent-inbox";
/// Identity-provider callback routes complete the sign-in flow and must
/// stay reachable without a session.
const AUTH_CALLBACK_PREFIX: &str = "/auth";
const API_PREFIX: &str = "/api";

/// Paths reachable without a session.
const ALLOW_LIST: &[&str] = &[
    "/signin",
    "/signup",
    "/reset-password",
    "/debug",
    "/health",
    "/metrics",
];

/// Signed-out-only pages; an authenticated user is bounced home.
const SIGNED_OUT_ONLY: &[&str] = &["/signin", "/signup", "/reset-password"];

fn is_allow_listed(path: &str) -> bool {
    ALLOW_LIST.contains(&path) || path.starts_with(AUTH_CALLBACK_PREFIX)
}

fn is_signed_out_only(path: &str) -> bool {
    SIGNED_OUT_ONLY.contains(&path)
}

/// Request-level authentication gate, run ahead of all routing.
pub async fn access_gate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();

    let session = state.identity.get_session(req.headers()).await;

    let mut response = if path.starts_with(LEGACY_INBOX_PREFIX) {
        // Deprecated surface, redirected regardless of authentication.
        Redirect::to(HOME_PATH).into_response()
    } else if session.user.is_none() {
        if is_allow_listed(&path) {
            next.run(req).await
        } else if path.starts_with(API_PREFIX) {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Unauthorized",
                    "message": "Authentication required",
                })),
            )
                .into_response()
        } else {
            Redirect::to(SIGNIN_PATH).into_response()
        }
    } else if is_signed_out_only(&path) {
        Redirect::to(HOME_PATH).into_response()
    } else {
        next.run(req).await
    };

    // Session-refresh cookies must survive every response, redirects
    // included; dropping them breaks session continuity.
    for cookie in &session.refresh_cookies {
        response
            .headers_mut()
            .append(header::SET_COOKIE, cookie.clone());
    }

    response
}
