use serde::{Deserialize, Serialize};

/// An agent-runtime deployment the gateway can proxy to. The list comes
/// from static configuration and never changes at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: String,
    pub name: String,
    pub deployment_url: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub default_graph_id: String,
    #[serde(default)]
    pub primary_graph_id: String,
}

/// Access token minted by the token-exchange endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    /// Advisory upstream lifetime. The session cookie uses a fixed
    /// lifetime independent of this value.
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}
