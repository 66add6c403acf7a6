//! In-memory template backend for development and testing

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use policy_functions_core::ParameterSet;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::{
    DeploymentOutcome, ExistingResourceInfo, ProvisioningHandle, TemplateError, TemplateService,
    DEFAULT_PARAMETERS_TEMPLATE,
};

/// A `deploy_template` call as seen by the backend
#[derive(Debug, Clone)]
pub struct DeploymentRecord {
    pub deployment_name: String,
    pub resource_group: String,
    pub template: String,
    pub parameters: ParameterSet,
}

#[derive(Debug, Default)]
struct State {
    resource_groups: BTreeMap<String, String>,
    apps: HashMap<(String, String), ExistingResourceInfo>,
    existence_checks: usize,
    created_groups: Vec<(String, String)>,
    deployments: Vec<DeploymentRecord>,
}

/// In-memory template backend
///
/// Deployments complete after `deployment_delay` and register the app
/// named by the `name` parameter, so a second provisioning run sees it as
/// existing.
#[derive(Debug, Clone)]
pub struct InMemoryTemplateService {
    state: Arc<Mutex<State>>,
    templates: HashMap<String, ParameterSet>,
    deployment_delay: Duration,
    deployment_failure: Option<String>,
}

impl InMemoryTemplateService {
    pub fn new() -> Self {
        Self::with_location("westus2")
    }

    /// Backend whose default parameters place resources in `location`
    pub fn with_location(location: &str) -> Self {
        let defaults: ParameterSet = [
            ("name", Value::from("")),
            ("storageName", Value::from("")),
            ("servicePlanName", Value::from("cloud-custodian")),
            ("location", Value::from(location)),
            ("appInsightsLocation", Value::from(location)),
            ("sku", Value::from("Standard")),
            ("skuCode", Value::from("S1")),
            ("workerSize", Value::from(0)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let mut templates = HashMap::new();
        templates.insert(DEFAULT_PARAMETERS_TEMPLATE.to_string(), defaults);

        Self {
            state: Arc::new(Mutex::new(State::default())),
            templates,
            deployment_delay: Duration::ZERO,
            deployment_failure: None,
        }
    }

    /// Register (or replace) a default parameter template
    pub fn with_template(mut self, name: &str, parameters: ParameterSet) -> Self {
        self.templates.insert(name.to_string(), parameters);
        self
    }

    pub fn with_deployment_delay(mut self, delay: Duration) -> Self {
        self.deployment_delay = delay;
        self
    }

    /// Make every deployment fail with `reason` once waited on
    pub fn with_failing_deployments(mut self, reason: &str) -> Self {
        self.deployment_failure = Some(reason.to_string());
        self
    }

    /// Seed an app that already exists before any provisioning
    pub fn add_existing_app(&self, resource_group: &str, name: &str, location: &str) {
        let mut state = self.state.lock();
        state
            .resource_groups
            .insert(resource_group.to_string(), location.to_string());
        state.apps.insert(
            (resource_group.to_string(), name.to_string()),
            ExistingResourceInfo {
                name: name.to_string(),
                resource_group: resource_group.to_string(),
                location: location.to_string(),
            },
        );
    }

    pub fn app(&self, resource_group: &str, name: &str) -> Option<ExistingResourceInfo> {
        let state = self.state.lock();
        state
            .apps
            .get(&(resource_group.to_string(), name.to_string()))
            .cloned()
    }

    pub fn existence_checks(&self) -> usize {
        self.state.lock().existence_checks
    }

    /// `(resource_group, location)` for every `create_resource_group` call
    pub fn created_groups(&self) -> Vec<(String, String)> {
        self.state.lock().created_groups.clone()
    }

    pub fn deployments(&self) -> Vec<DeploymentRecord> {
        self.state.lock().deployments.clone()
    }
}

impl Default for InMemoryTemplateService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TemplateService for InMemoryTemplateService {
    async fn get_default_parameters(&self, template: &str) -> Result<ParameterSet, TemplateError> {
        self.templates
            .get(template)
            .cloned()
            .ok_or_else(|| TemplateError::TemplateNotFound(template.to_string()))
    }

    async fn resource_exists(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<Option<ExistingResourceInfo>, TemplateError> {
        let mut state = self.state.lock();
        state.existence_checks += 1;
        Ok(state
            .apps
            .get(&(resource_group.to_string(), name.to_string()))
            .cloned())
    }

    async fn create_resource_group(&self, resource_group: &str, location: &str) -> Result<(), TemplateError> {
        let mut state = self.state.lock();
        state
            .created_groups
            .push((resource_group.to_string(), location.to_string()));
        state
            .resource_groups
            .insert(resource_group.to_string(), location.to_string());
        Ok(())
    }

    async fn deploy_template(
        &self,
        resource_group: &str,
        template: &str,
        parameters: &ParameterSet,
    ) -> Result<ProvisioningHandle, TemplateError> {
        let deployment_name = format!("{}-{}", template.trim_end_matches(".json"), Uuid::new_v4().simple());
        let app = ExistingResourceInfo {
            name: parameters.require_str("name")?.to_string(),
            resource_group: resource_group.to_string(),
            location: parameters.get_str("location").unwrap_or_default().to_string(),
        };

        {
            let mut state = self.state.lock();
            if !state.resource_groups.contains_key(resource_group) {
                return Err(TemplateError::ResourceGroup(format!(
                    "Resource group {} not found",
                    resource_group
                )));
            }
            state.deployments.push(DeploymentRecord {
                deployment_name: deployment_name.clone(),
                resource_group: resource_group.to_string(),
                template: template.to_string(),
                parameters: parameters.clone(),
            });
        }

        let state = self.state.clone();
        let delay = self.deployment_delay;
        let failure = self.deployment_failure.clone();
        let name = deployment_name.clone();

        Ok(ProvisioningHandle::new(deployment_name, async move {
            tokio::time::sleep(delay).await;

            if let Some(reason) = failure {
                return Err(TemplateError::Deployment {
                    deployment: name,
                    reason,
                });
            }

            let resource_group = app.resource_group.clone();
            state
                .lock()
                .apps
                .insert((app.resource_group.clone(), app.name.clone()), app);

            Ok(DeploymentOutcome {
                deployment_name: name,
                resource_group,
                completed_at: Utc::now(),
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FUNCTION_APP_TEMPLATE;

    fn app_parameters() -> ParameterSet {
        let mut params = ParameterSet::new();
        params.insert("name", "ops-plan-tag-check");
        params.insert("location", "eastus");
        params
    }

    #[tokio::test]
    async fn test_default_parameters() {
        let service = InMemoryTemplateService::with_location("eastus");
        let params = service
            .get_default_parameters(DEFAULT_PARAMETERS_TEMPLATE)
            .await
            .unwrap();
        assert_eq!(params.get_str("location"), Some("eastus"));
        assert_eq!(params.get_str("skuCode"), Some("S1"));

        let missing = service.get_default_parameters("nope.json").await;
        assert!(matches!(missing, Err(TemplateError::TemplateNotFound(_))));
    }

    #[tokio::test]
    async fn test_deploy_registers_app_on_completion() {
        let service = InMemoryTemplateService::new();
        service.create_resource_group("Ops Plan", "eastus").await.unwrap();

        let handle = service
            .deploy_template("Ops Plan", FUNCTION_APP_TEMPLATE, &app_parameters())
            .await
            .unwrap();
        assert!(service.app("Ops Plan", "ops-plan-tag-check").is_none());

        let outcome = handle.wait_timeout(Duration::from_secs(5)).await.unwrap();
        assert_eq!(outcome.resource_group, "Ops Plan");
        assert!(outcome.deployment_name.starts_with("dedicated_functionapp-"));

        let app = service.app("Ops Plan", "ops-plan-tag-check").unwrap();
        assert_eq!(app.location, "eastus");
        assert_eq!(service.deployments().len(), 1);
    }

    #[tokio::test]
    async fn test_deploy_requires_resource_group() {
        let service = InMemoryTemplateService::new();
        let result = service
            .deploy_template("missing", FUNCTION_APP_TEMPLATE, &app_parameters())
            .await;
        assert!(matches!(result, Err(TemplateError::ResourceGroup(_))));
        assert!(service.deployments().is_empty());
    }

    #[tokio::test]
    async fn test_failing_deployment() {
        let service = InMemoryTemplateService::new().with_failing_deployments("quota exceeded");
        service.create_resource_group("rg", "eastus").await.unwrap();
        let handle = service
            .deploy_template("rg", FUNCTION_APP_TEMPLATE, &app_parameters())
            .await
            .unwrap();

        let err = handle.wait_timeout(Duration::from_secs(5)).await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
        assert!(service.app("rg", "ops-plan-tag-check").is_none());
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let service = InMemoryTemplateService::new().with_deployment_delay(Duration::from_secs(60));
        service.create_resource_group("rg", "eastus").await.unwrap();
        let handle = service
            .deploy_template("rg", FUNCTION_APP_TEMPLATE, &app_parameters())
            .await
            .unwrap();

        let err = handle.wait_timeout(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, TemplateError::Timeout { .. }));
    }
}
