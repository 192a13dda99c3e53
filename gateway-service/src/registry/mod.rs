use crate::models::Deployment;

/// Immutable snapshot of the configured deployments.
///
/// Absent or malformed configuration is not fatal: the gateway starts
/// with an empty registry and every proxy request resolves to 404.
pub struct DeploymentRegistry {
    deployments: Vec<Deployment>,
}

impl DeploymentRegistry {
    pub fn from_config(raw: Option<&str>) -> Self {
        let deployments = match raw {
            None => {
                tracing::warn!("DEPLOYMENTS is not set, deployment registry is empty");
                Vec::new()
            }
            Some(raw) => match serde_json::from_str::<Vec<Deployment>>(raw) {
                Ok(deployments) => deployments,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "failed to parse DEPLOYMENTS, deployment registry is empty"
                    );
                    Vec::new()
                }
            },
        };

        Self { deployments }
    }

    pub fn list(&self) -> &[Deployment] {
        &self.deployments
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Deployment> {
        self.deployments.iter().find(|d| d.id == id)
    }

    /// The deployment the frontend should select when none is specified.
    pub fn default_deployment(&self) -> Option<&Deployment> {
        self.deployments
            .iter()
            .find(|d| d.is_default)
            .or_else(|| self.deployments.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPLOYMENTS: &str = r#"[
        {
            "id": "dep-1",
            "name": "staging",
            "deploymentUrl": "http://localhost:2024",
            "isDefault": false,
            "defaultGraphId": "agent",
            "primaryGraphId": "agent"
        },
        {
            "id": "dep-2",
            "name": "production",
            "deploymentUrl": "http://localhost:2025",
            "isDefault": true,
            "defaultGraphId": "agent",
            "primaryGraphId": "supervisor"
        }
    ]"#;

    #[test]
    fn parses_configured_deployments() {
        let registry = DeploymentRegistry::from_config(Some(DEPLOYMENTS));

        assert_eq!(registry.list().len(), 2);
        assert_eq!(registry.find_by_id("dep-1").unwrap().name, "staging");
        assert!(registry.find_by_id("dep-3").is_none());
    }

    #[test]
    fn default_deployment_prefers_flagged_entry() {
        let registry = DeploymentRegistry::from_config(Some(DEPLOYMENTS));

        assert_eq!(registry.default_deployment().unwrap().id, "dep-2");
    }

    #[test]
    fn absent_configuration_yields_empty_registry() {
        let registry = DeploymentRegistry::from_config(None);

        assert!(registry.list().is_empty());
    }

    #[test]
    fn malformed_configuration_yields_empty_registry() {
        let registry = DeploymentRegistry::from_config(Some("{not json"));

        assert!(registry.list().is_empty());
        assert!(registry.find_by_id("dep-1").is_none());
    }
}
