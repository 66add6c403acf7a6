//! Function app provisioning
//!
//! The remote existence check is the only record of whether a policy's
//! app has been provisioned. Checking and creating are separate calls, so
//! callers must not provision the same target concurrently.

use policy_functions_core::ParameterSet;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    DeploymentOutcome, ExistingResourceInfo, ProvisioningHandle, TemplateError, TemplateService,
    FUNCTION_APP_TEMPLATE,
};

/// Configuration for provisioning function apps
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    /// Template deployed when the app does not exist yet
    pub template: String,
    /// Upper bound on waiting for a template deployment (default: 30 minutes)
    pub deployment_timeout: Duration,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            template: FUNCTION_APP_TEMPLATE.to_string(),
            deployment_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// What provisioning found or did
#[derive(Debug, Clone, PartialEq)]
pub enum ProvisionState {
    /// The app was already there and was left untouched
    Existing(ExistingResourceInfo),
    /// The resource group and app were created
    Created(DeploymentOutcome),
}

pub struct ResourceProvisioner {
    service: Arc<dyn TemplateService>,
    config: ProvisionerConfig,
}

impl ResourceProvisioner {
    pub fn new(service: Arc<dyn TemplateService>) -> Self {
        Self::with_config(service, ProvisionerConfig::default())
    }

    pub fn with_config(service: Arc<dyn TemplateService>, config: ProvisionerConfig) -> Self {
        Self { service, config }
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Look up an existing app
    pub async fn ensure(
        &self,
        resource_group: &str,
        webapp: &str,
    ) -> Result<Option<ExistingResourceInfo>, TemplateError> {
        self.service.resource_exists(resource_group, webapp).await
    }

    /// Create the resource group and start the app deployment
    pub async fn create(
        &self,
        resource_group: &str,
        location: &str,
        parameters: &ParameterSet,
    ) -> Result<ProvisioningHandle, TemplateError> {
        self.service
            .create_resource_group(resource_group, location)
            .await?;
        self.service
            .deploy_template(resource_group, &self.config.template, parameters)
            .await
    }

    /// Make sure the app described by `parameters` exists
    ///
    /// The resource group is the `servicePlanName` parameter and the app is
    /// the `name` parameter. A new deployment is waited on for at most
    /// `deployment_timeout`; nothing is rolled back if it fails.
    pub async fn provision(&self, parameters: &ParameterSet) -> Result<ProvisionState, TemplateError> {
        let resource_group = parameters.require_str("servicePlanName")?;
        let webapp = parameters.require_str("name")?;
        let location = parameters.require_str("location")?;

        if let Some(existing) = self.ensure(resource_group, webapp).await? {
            tracing::info!(
                "Found existing App {} ({}) in group {}",
                webapp,
                existing.location,
                resource_group
            );
            return Ok(ProvisionState::Existing(existing));
        }

        tracing::info!(
            "Creating App {} in group {} ({})",
            webapp,
            resource_group,
            location
        );
        let handle = self.create(resource_group, location, parameters).await?;
        tracing::debug!("Waiting for deployment {}", handle.deployment_name());

        let outcome = handle.wait_timeout(self.config.deployment_timeout).await?;
        tracing::info!(
            "Deployment {} completed in group {}",
            outcome.deployment_name,
            outcome.resource_group
        );
        Ok(ProvisionState::Created(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryTemplateService;
    use tracing_test::traced_test;

    fn parameters() -> ParameterSet {
        let mut params = ParameterSet::new();
        params.insert("name", "ops-plan-tag-check");
        params.insert("servicePlanName", "Ops Plan");
        params.insert("location", "eastus");
        params
    }

    #[tokio::test]
    #[traced_test]
    async fn test_existing_app_is_not_recreated() {
        let service = Arc::new(InMemoryTemplateService::new());
        service.add_existing_app("Ops Plan", "ops-plan-tag-check", "westeurope");
        let provisioner = ResourceProvisioner::new(service.clone());

        let state = provisioner.provision(&parameters()).await.unwrap();
        match state {
            ProvisionState::Existing(info) => assert_eq!(info.location, "westeurope"),
            other => panic!("expected existing app, got {:?}", other),
        }
        assert!(service.created_groups().is_empty());
        assert!(service.deployments().is_empty());
        assert!(logs_contain(
            "Found existing App ops-plan-tag-check (westeurope) in group Ops Plan"
        ));
    }

    #[tokio::test]
    async fn test_missing_app_is_created_once() {
        let service = Arc::new(InMemoryTemplateService::new());
        let provisioner = ResourceProvisioner::new(service.clone());

        let state = provisioner.provision(&parameters()).await.unwrap();
        assert!(matches!(state, ProvisionState::Created(_)));
        assert_eq!(
            service.created_groups(),
            vec![("Ops Plan".to_string(), "eastus".to_string())]
        );
        let deployments = service.deployments();
        assert_eq!(deployments.len(), 1);
        assert_eq!(deployments[0].template, FUNCTION_APP_TEMPLATE);

        // Second run converges on the app the first one created
        let again = provisioner.provision(&parameters()).await.unwrap();
        assert!(matches!(again, ProvisionState::Existing(_)));
        assert_eq!(service.deployments().len(), 1);
    }

    #[tokio::test]
    async fn test_deployment_timeout() {
        let service = Arc::new(
            InMemoryTemplateService::new().with_deployment_delay(Duration::from_secs(60)),
        );
        let config = ProvisionerConfig {
            deployment_timeout: Duration::from_millis(20),
            ..ProvisionerConfig::default()
        };
        let provisioner = ResourceProvisioner::with_config(service.clone(), config);

        let err = provisioner.provision(&parameters()).await.unwrap_err();
        assert!(matches!(err, TemplateError::Timeout { .. }));
        assert!(service.app("Ops Plan", "ops-plan-tag-check").is_none());
    }

    #[tokio::test]
    async fn test_missing_parameters_fail_before_lookup() {
        let service = Arc::new(InMemoryTemplateService::new());
        let provisioner = ResourceProvisioner::new(service.clone());

        let mut params = parameters();
        params.insert("location", "");
        let err = provisioner.provision(&params).await.unwrap_err();
        assert!(matches!(err, TemplateError::Configuration(_)));
        assert_eq!(service.existence_checks(), 0);
    }
}
