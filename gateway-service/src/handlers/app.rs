use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::json;

use crate::models::Deployment;
use crate::AppState;

/// Liveness probe for Docker/K8s.
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "gateway-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Deployment metadata exposed to the frontend. Base URLs stay
/// server-side; the frontend always goes through the proxy.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSummary {
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub default_graph_id: String,
    pub primary_graph_id: String,
}

impl From<&Deployment> for DeploymentSummary {
    fn from(deployment: &Deployment) -> Self {
        Self {
            id: deployment.id.clone(),
            name: deployment.name.clone(),
            is_default: deployment.is_default,
            default_graph_id: deployment.default_graph_id.clone(),
            primary_graph_id: deployment.primary_graph_id.clone(),
        }
    }
}

pub async fn list_deployments(State(state): State<AppState>) -> Json<Vec<DeploymentSummary>> {
    Json(
        state
            .registry
            .list()
            .iter()
            .map(DeploymentSummary::from)
            .collect(),
    )
}
