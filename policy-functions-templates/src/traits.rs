//! Template service trait defining the interface to the infrastructure backend

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use policy_functions_core::ParameterSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::TemplateError;

/// Parameter file holding the defaults for a dedicated function app
pub const DEFAULT_PARAMETERS_TEMPLATE: &str = "dedicated_functionapp.parameters.json";

/// Template that creates a dedicated function app with its plan and storage
pub const FUNCTION_APP_TEMPLATE: &str = "dedicated_functionapp.json";

/// A function app that already exists in the target resource group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingResourceInfo {
    pub name: String,
    pub resource_group: String,
    pub location: String,
}

/// A completed template deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentOutcome {
    pub deployment_name: String,
    pub resource_group: String,
    pub completed_at: DateTime<Utc>,
}

/// An in-flight template deployment
///
/// The only thing to do with a handle is wait for it, and the wait is
/// always bounded. Dropping the handle (or timing out) stops waiting but
/// does not cancel the remote deployment.
pub struct ProvisioningHandle {
    deployment_name: String,
    completion: BoxFuture<'static, Result<DeploymentOutcome, TemplateError>>,
}

impl ProvisioningHandle {
    pub fn new<F>(deployment_name: impl Into<String>, completion: F) -> Self
    where
        F: Future<Output = Result<DeploymentOutcome, TemplateError>> + Send + 'static,
    {
        Self {
            deployment_name: deployment_name.into(),
            completion: Box::pin(completion),
        }
    }

    pub fn deployment_name(&self) -> &str {
        &self.deployment_name
    }

    /// Block until the deployment completes or `timeout` elapses
    pub async fn wait_timeout(self, timeout: Duration) -> Result<DeploymentOutcome, TemplateError> {
        match tokio::time::timeout(timeout, self.completion).await {
            Ok(result) => result,
            Err(_) => Err(TemplateError::Timeout {
                deployment: self.deployment_name,
                timeout,
            }),
        }
    }
}

impl fmt::Debug for ProvisioningHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisioningHandle")
            .field("deployment_name", &self.deployment_name)
            .finish_non_exhaustive()
    }
}

/// Trait for infrastructure template operations
#[async_trait]
pub trait TemplateService: Send + Sync {
    /// Load the default parameter set stored under a template name
    async fn get_default_parameters(&self, template: &str) -> Result<ParameterSet, TemplateError>;

    /// Overlay `overrides` onto `base`; overrides win and unknown keys are kept
    fn update_parameters(&self, mut base: ParameterSet, overrides: Map<String, Value>) -> ParameterSet {
        for (name, value) in overrides {
            base.insert(name, value);
        }
        base
    }

    /// Look up a function app by name within a resource group
    async fn resource_exists(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<Option<ExistingResourceInfo>, TemplateError>;

    /// Create (or update) a resource group in a location
    async fn create_resource_group(&self, resource_group: &str, location: &str) -> Result<(), TemplateError>;

    /// Start a template deployment into a resource group
    async fn deploy_template(
        &self,
        resource_group: &str,
        template: &str,
        parameters: &ParameterSet,
    ) -> Result<ProvisioningHandle, TemplateError>;
}
