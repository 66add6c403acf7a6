//! Execution mode state machine
//!
//! A policy's function app is either unprovisioned or provisioned, and
//! which one is decided by asking the template backend every time rather
//! than by anything stored here. `provision()` checks and then creates in
//! separate calls, so callers must serialize provisioning per target.

use chrono::{DateTime, Utc};
use policy_functions_core::schema::{PERIODIC_MODE, STREAM_MODE};
use policy_functions_core::{
    ConfigurationError, EvaluationResult, PolicyDefinition, Trigger, POLICY_METRICS,
};
use policy_functions_packager::ArtifactBuilder;
use policy_functions_templates::{
    ParameterResolver, ProvisionState, ProvisionerConfig, ResourceProvisioner, TemplateService,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::{DeployResult, Deployer, ModeError, PullEvaluator};

/// Collaborators shared by every execution mode
pub struct ModeServices {
    pub templates: Arc<dyn TemplateService>,
    pub builder: Arc<dyn ArtifactBuilder>,
    pub evaluator: Arc<dyn PullEvaluator>,
    pub provisioner: ProvisionerConfig,
}

impl ModeServices {
    pub fn new(
        templates: Arc<dyn TemplateService>,
        builder: Arc<dyn ArtifactBuilder>,
        evaluator: Arc<dyn PullEvaluator>,
    ) -> Self {
        Self {
            templates,
            builder,
            evaluator,
            provisioner: ProvisionerConfig::default(),
        }
    }

    pub fn with_provisioner(mut self, config: ProvisionerConfig) -> Self {
        self.provisioner = config;
        self
    }
}

/// Result of a completed `provision()`
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionOutcome {
    pub app_name: String,
    pub resource_group: String,
    pub location: String,
    /// Whether infrastructure was created by this call
    pub created: bool,
    pub deployment_name: Option<String>,
    /// Size of the package that was published
    pub package_size_bytes: usize,
    pub published_at: DateTime<Utc>,
}

/// Provisioning shared by both trigger variants
struct FunctionMode {
    policy: PolicyDefinition,
    services: Arc<ModeServices>,
}

impl FunctionMode {
    async fn provision(&self) -> Result<ProvisionOutcome, ModeError> {
        let templates = self.services.templates.clone();

        let parameters = ParameterResolver::new(templates.clone())
            .resolve(&self.policy)
            .await?;
        let resource_group = parameters.require_str("servicePlanName")?.to_string();
        let app_name = parameters.require_str("name")?.to_string();

        let provisioner =
            ResourceProvisioner::with_config(templates, self.services.provisioner.clone());
        let (location, deployment_name) = match provisioner.provision(&parameters).await? {
            ProvisionState::Existing(existing) => (existing.location, None),
            ProvisionState::Created(outcome) => (
                parameters.require_str("location")?.to_string(),
                Some(outcome.deployment_name),
            ),
        };

        tracing::info!("Building function package for {}", app_name);
        let artifact = self.services.builder.build(&self.policy)?;

        match Deployer::deploy(artifact.as_ref(), &app_name).await? {
            DeployResult::Published => Ok(ProvisionOutcome {
                app_name,
                resource_group,
                location,
                created: deployment_name.is_some(),
                deployment_name,
                package_size_bytes: artifact.size_bytes(),
                published_at: Utc::now(),
            }),
            DeployResult::Aborted => Err(ModeError::UnhealthyTarget { target: app_name }),
        }
    }
}

/// Timer-triggered mode: each trigger runs a pull evaluation
pub struct PeriodicMode {
    base: FunctionMode,
    schedule: Option<String>,
}

impl PeriodicMode {
    pub fn schedule(&self) -> Option<&str> {
        self.schedule.as_deref()
    }

    /// The timer binding needs a cron expression with 5 or 6 fields
    fn validate(&self) -> Result<(), ModeError> {
        let schedule = self
            .schedule
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigurationError::MissingField("mode.schedule".to_string()))?;

        let fields = schedule.split_whitespace().count();
        if !(5..=6).contains(&fields) {
            return Err(ConfigurationError::invalid(
                "mode.schedule",
                format!("expected 5 or 6 cron fields, found {}", fields),
            )
            .into());
        }
        Ok(())
    }

    async fn run(&self, event: Option<Value>) -> Result<EvaluationResult, ModeError> {
        let policy = &self.base.policy;
        if let Some(event) = event {
            tracing::debug!("Timer event for {}: {}", policy.name, event);
        }

        let result = self
            .base
            .services
            .evaluator
            .evaluate(policy)
            .await
            .map_err(|e| ModeError::Evaluation(format!("{:#}", e)))?;

        for (metric, value) in result.metrics() {
            tracing::debug!(policy = %policy.name, metric, value, "policy metric");
        }
        Ok(result)
    }
}

/// Event-triggered mode fed by an event-log source
pub struct StreamMode {
    base: FunctionMode,
    source: String,
}

impl StreamMode {
    pub fn source(&self) -> &str {
        &self.source
    }

    async fn run(&self, context: Option<Value>) -> Result<EvaluationResult, ModeError> {
        let context = context.unwrap_or(Value::Null);
        tracing::info!("{}", context);
        Err(ModeError::Unsupported {
            operation: "run",
            mode: STREAM_MODE,
        })
    }
}

/// A serverless policy bound to its trigger variant
pub enum ExecutionMode {
    Periodic(PeriodicMode),
    Stream(StreamMode),
}

impl ExecutionMode {
    pub fn new(policy: PolicyDefinition, services: Arc<ModeServices>) -> Self {
        let trigger = policy.trigger().clone();
        let base = FunctionMode { policy, services };
        match trigger {
            Trigger::Periodic { schedule } => ExecutionMode::Periodic(PeriodicMode { base, schedule }),
            Trigger::Stream { source } => ExecutionMode::Stream(StreamMode { base, source }),
        }
    }

    /// Parse a policy document and bind it to its mode
    pub fn from_value(data: Value, services: Arc<ModeServices>) -> Result<Self, ModeError> {
        let policy = PolicyDefinition::from_value(data)?;
        Ok(Self::new(policy, services))
    }

    fn base(&self) -> &FunctionMode {
        match self {
            ExecutionMode::Periodic(mode) => &mode.base,
            ExecutionMode::Stream(mode) => &mode.base,
        }
    }

    pub fn policy(&self) -> &PolicyDefinition {
        &self.base().policy
    }

    /// The mode's `type` tag
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionMode::Periodic(_) => PERIODIC_MODE,
            ExecutionMode::Stream(_) => STREAM_MODE,
        }
    }

    /// Metric names every evaluation of this policy reports
    pub fn metrics(&self) -> &'static [&'static str] {
        &POLICY_METRICS
    }

    /// Check mode-specific configuration
    pub fn validate(&self) -> Result<(), ModeError> {
        match self {
            ExecutionMode::Periodic(mode) => mode.validate(),
            ExecutionMode::Stream(_) => Ok(()),
        }
    }

    /// Make sure the function app exists and publish the policy to it
    ///
    /// Steps run in order and the first failure stops the rest: validate,
    /// resolve parameters, provision if missing, build, then publish if the
    /// app is healthy. An unhealthy app yields `ModeError::UnhealthyTarget`
    /// without anything being published.
    pub async fn provision(&self) -> Result<ProvisionOutcome, ModeError> {
        self.validate()?;
        self.base().provision().await
    }

    /// Handle a trigger invocation from the function host
    pub async fn run(
        &self,
        event: Option<Value>,
        context: Option<Value>,
    ) -> Result<EvaluationResult, ModeError> {
        match self {
            ExecutionMode::Periodic(mode) => mode.run(event).await,
            ExecutionMode::Stream(mode) => mode.run(context).await,
        }
    }

    /// Retrieve function logs between `start` and `end`
    pub async fn get_logs(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>, ModeError> {
        tracing::debug!(
            "Log retrieval requested for {} from {} to {}",
            self.policy().name,
            start,
            end
        );
        Err(ModeError::Unsupported {
            operation: "get_logs",
            mode: self.name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticEvaluator;
    use policy_functions_packager::{InMemoryFunctionHost, PackageBuilder};
    use policy_functions_templates::InMemoryTemplateService;
    use serde_json::json;
    use tracing_test::traced_test;

    struct Fixture {
        templates: Arc<InMemoryTemplateService>,
        host: Arc<InMemoryFunctionHost>,
        evaluator: Arc<StaticEvaluator>,
        services: Arc<ModeServices>,
    }

    fn fixture() -> Fixture {
        let templates = Arc::new(InMemoryTemplateService::with_location("eastus"));
        let host = Arc::new(InMemoryFunctionHost::new());
        let evaluator = Arc::new(StaticEvaluator::new(2, json!({"matched": 2})));
        let services = Arc::new(ModeServices::new(
            templates.clone(),
            Arc::new(PackageBuilder::new(host.clone())),
            evaluator.clone(),
        ));
        Fixture {
            templates,
            host,
            evaluator,
            services,
        }
    }

    fn periodic(options: Value) -> Value {
        json!({
            "name": "tag-check",
            "resource": "azure.vm",
            "mode": {
                "type": "azure-periodic",
                "schedule": "0 */4 * * *",
                "provision-options": options
            }
        })
    }

    #[tokio::test]
    async fn test_cold_provision_creates_and_publishes() {
        let f = fixture();
        let mode = ExecutionMode::from_value(periodic(json!({"servicePlanName": "Ops Plan"})), f.services.clone())
            .unwrap();

        let outcome = mode.provision().await.unwrap();
        assert!(outcome.created);
        assert_eq!(outcome.app_name, "ops-plan-tag-check");
        assert_eq!(outcome.resource_group, "Ops Plan");
        assert_eq!(outcome.location, "eastus");
        assert_eq!(f.templates.deployments().len(), 1);
        let uploads = f.host.uploads();
        assert_eq!(uploads.len(), 1);
        assert!(outcome.package_size_bytes > 0);
        assert_eq!(outcome.package_size_bytes, uploads[0].size_bytes);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_existing_app_skips_creation() {
        let f = fixture();
        f.templates
            .add_existing_app("Ops Plan", "ops-plan-tag-check", "northeurope");
        let mode = ExecutionMode::from_value(periodic(json!({"servicePlanName": "Ops Plan"})), f.services.clone())
            .unwrap();

        let outcome = mode.provision().await.unwrap();
        assert!(!outcome.created);
        assert_eq!(outcome.location, "northeurope");
        assert!(f.templates.created_groups().is_empty());
        assert!(f.templates.deployments().is_empty());
        assert_eq!(f.host.uploads().len(), 1);
        assert!(logs_contain(
            "Found existing App ops-plan-tag-check (northeurope) in group Ops Plan"
        ));
        assert!(logs_contain("Building function package for ops-plan-tag-check"));
    }

    #[tokio::test]
    async fn test_missing_plan_fails_before_remote_calls() {
        let f = fixture();
        let mode = ExecutionMode::from_value(periodic(json!({"location": "eastus"})), f.services.clone())
            .unwrap();

        let err = mode.provision().await.unwrap_err();
        assert!(matches!(err, ModeError::Configuration(_)));
        assert_eq!(f.templates.existence_checks(), 0);
        assert!(f.host.status_checks().is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_unhealthy_target_aborts_without_publish() {
        let f = fixture();
        f.host.mark_unhealthy("ops-plan-tag-check");
        let mode = ExecutionMode::from_value(periodic(json!({"servicePlanName": "Ops Plan"})), f.services.clone())
            .unwrap();

        let err = mode.provision().await.unwrap_err();
        assert!(matches!(err, ModeError::UnhealthyTarget { ref target } if target == "ops-plan-tag-check"));
        assert!(f.host.uploads().is_empty());
        assert!(logs_contain("Aborted deployment, ensure Application Service is healthy."));
    }

    #[tokio::test]
    async fn test_bad_schedule_fails_validation() {
        let f = fixture();
        let mut doc = periodic(json!({"servicePlanName": "Ops Plan"}));
        doc["mode"]["schedule"] = json!("every four hours");
        let mode = ExecutionMode::from_value(doc, f.services.clone()).unwrap();

        assert!(matches!(mode.validate(), Err(ModeError::Configuration(_))));
        assert!(mode.provision().await.is_err());
        assert_eq!(f.templates.existence_checks(), 0);
    }

    #[tokio::test]
    async fn test_periodic_run_pulls() {
        let f = fixture();
        let mode = ExecutionMode::from_value(periodic(json!({"servicePlanName": "Ops Plan"})), f.services.clone())
            .unwrap();

        let result = mode.run(None, None).await.unwrap();
        assert_eq!(result.policy, "tag-check");
        assert_eq!(result.resource_count, 2);
        assert_eq!(f.evaluator.runs(), 1);
    }

    #[tokio::test]
    async fn test_stream_run_is_unsupported() {
        let f = fixture();
        let mode = ExecutionMode::from_value(
            json!({
                "name": "watch",
                "mode": {"type": "azure-stream", "provision-options": {"servicePlanName": "plan"}}
            }),
            f.services.clone(),
        )
        .unwrap();

        assert_eq!(mode.name(), "azure-stream");
        assert!(mode.validate().is_ok());
        let err = mode
            .run(None, Some(json!({"invocation_id": "abc"})))
            .await
            .unwrap_err();
        assert!(err.is_unsupported());
        assert_eq!(f.evaluator.runs(), 0);
    }

    #[tokio::test]
    async fn test_get_logs_is_unsupported_for_both_modes() {
        let f = fixture();
        let now = Utc::now();
        let periodic = ExecutionMode::from_value(periodic(json!({"servicePlanName": "p"})), f.services.clone())
            .unwrap();
        let stream = ExecutionMode::from_value(
            json!({"name": "watch", "mode": {"type": "azure-stream"}}),
            f.services.clone(),
        )
        .unwrap();

        for mode in [periodic, stream] {
            let err = mode.get_logs(now - chrono::Duration::hours(1), now).await.unwrap_err();
            assert!(matches!(
                err,
                ModeError::Unsupported { operation: "get_logs", .. }
            ));
        }
    }

    #[test]
    fn test_metrics() {
        let f = fixture();
        let mode = ExecutionMode::from_value(periodic(json!({})), f.services).unwrap();
        assert_eq!(mode.metrics(), &["ResourceCount", "ResourceTime", "ActionTime"]);
    }
}
