//! Template parameter resolution for a policy's function app

use policy_functions_core::{normalize_resource_name, ConfigurationError, ParameterSet, PolicyDefinition};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::{TemplateError, TemplateService, DEFAULT_PARAMETERS_TEMPLATE};

/// Keys the function app template cannot deploy without
pub const REQUIRED_PARAMETERS: [&str; 4] = ["name", "storageName", "servicePlanName", "location"];

/// Merges a template's default parameters with values derived from a policy
pub struct ParameterResolver {
    service: Arc<dyn TemplateService>,
    template: String,
}

impl ParameterResolver {
    pub fn new(service: Arc<dyn TemplateService>) -> Self {
        Self {
            service,
            template: DEFAULT_PARAMETERS_TEMPLATE.to_string(),
        }
    }

    /// Use a different default parameter template
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Resolve the full parameter set for deploying `policy`
    pub async fn resolve(&self, policy: &PolicyDefinition) -> Result<ParameterSet, TemplateError> {
        // Fail on a bad policy before touching the backend
        let overrides = Self::overrides(policy)?;

        let defaults = self.service.get_default_parameters(&self.template).await?;
        let parameters = self.service.update_parameters(defaults, overrides);

        for name in REQUIRED_PARAMETERS {
            parameters.require_str(name)?;
        }

        tracing::debug!(
            "Resolved {} template parameters for policy {}",
            parameters.len(),
            policy.name
        );
        Ok(parameters)
    }

    /// Values a policy contributes on top of the template defaults
    ///
    /// `name` is `<servicePlanName>-<policy name>` normalized for use as an
    /// app name. `storageName` is the plan name as written, without
    /// normalization. Explicit provision options override both.
    pub fn overrides(policy: &PolicyDefinition) -> Result<Map<String, Value>, ConfigurationError> {
        let plan = policy
            .provision_options()
            .and_then(|o| o.service_plan_name.as_deref())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                ConfigurationError::MissingField("mode.provision-options.servicePlanName".to_string())
            })?;

        if policy.name.trim().is_empty() {
            return Err(ConfigurationError::MissingField("name".to_string()));
        }

        let mut overrides = Map::new();
        overrides.insert(
            "name".to_string(),
            Value::String(normalize_resource_name(&format!("{}-{}", plan, policy.name))),
        );
        overrides.insert("storageName".to_string(), Value::String(plan.to_string()));

        if let Some(options) = policy.provision_options() {
            overrides.extend(options.overrides());
        }

        Ok(overrides)
    }
}
