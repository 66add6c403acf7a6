//! Core domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::schema;
use crate::ConfigurationError;

/// Metric names reported by every evaluation pass
pub const POLICY_METRICS: [&str; 3] = ["ResourceCount", "ResourceTime", "ActionTime"];

/// Event-log source used by stream policies that don't name one
pub const DEFAULT_STREAM_SOURCE: &str = "activity-log";

/// Lowercase a resource name and replace spaces with hyphens
pub fn normalize_resource_name(raw: &str) -> String {
    raw.replace(' ', "-").to_lowercase()
}

/// Optional infrastructure knobs from `mode.provision-options`
///
/// Keys beyond the known ones are kept in `extra` and passed through to
/// the template verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvisionOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_insights_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_plan_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_size: Option<serde_json::Number>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProvisionOptions {
    /// All present options as template parameter overrides, keyed by
    /// their document names
    pub fn overrides(&self) -> Map<String, Value> {
        let mut map = Map::new();
        let known = [
            ("location", self.location.as_ref()),
            ("appInsightsLocation", self.app_insights_location.as_ref()),
            ("servicePlanName", self.service_plan_name.as_ref()),
            ("sku", self.sku.as_ref()),
            ("skuCode", self.sku_code.as_ref()),
        ];
        for (key, value) in known {
            if let Some(value) = value {
                map.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        if let Some(size) = &self.worker_size {
            map.insert("workerSize".to_string(), Value::Number(size.clone()));
        }
        for (key, value) in &self.extra {
            map.insert(key.clone(), value.clone());
        }
        map
    }
}

/// How the deployed function gets invoked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Trigger {
    /// Timer-triggered on a cron schedule
    #[serde(rename = "azure-periodic")]
    Periodic {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schedule: Option<String>,
    },
    /// Triggered by events from an event-log source
    #[serde(rename = "azure-stream")]
    Stream { source: String },
}

impl Trigger {
    /// The `type` tag this trigger is declared with
    pub fn mode_name(&self) -> &'static str {
        match self {
            Trigger::Periodic { .. } => schema::PERIODIC_MODE,
            Trigger::Stream { .. } => schema::STREAM_MODE,
        }
    }
}

/// The `mode` section of a policy document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeConfig {
    #[serde(flatten)]
    pub trigger: Trigger,
    #[serde(rename = "provision-options", skip_serializing_if = "Option::is_none")]
    pub provision_options: Option<ProvisionOptions>,
}

impl ModeConfig {
    /// Parse a `mode` section, rejecting anything outside the mode's schema
    pub fn from_value(mode: &Value) -> Result<Self, ConfigurationError> {
        let schema = schema::validate_mode(mode)?;

        let schedule = mode
            .get("schedule")
            .and_then(Value::as_str)
            .map(str::to_string);
        let source = mode
            .get("source")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_STREAM_SOURCE)
            .to_string();

        let trigger = match schema.mode {
            schema::PERIODIC_MODE => Trigger::Periodic { schedule },
            _ => Trigger::Stream { source },
        };

        let provision_options = match mode.get("provision-options") {
            Some(options) => Some(serde_json::from_value(options.clone())?),
            None => None,
        };

        Ok(Self {
            trigger,
            provision_options,
        })
    }
}

/// A declarative policy document as handed to the deployment mode
///
/// Only `name`, `resource` and `mode` are interpreted here; filters,
/// actions and everything else stay in the raw document for the
/// evaluation engine.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    pub mode: ModeConfig,
    #[serde(skip)]
    data: Value,
}

impl PolicyDefinition {
    pub fn from_value(data: Value) -> Result<Self, ConfigurationError> {
        if !data.is_object() {
            return Err(ConfigurationError::invalid(
                "policy",
                "policy definition must be an object",
            ));
        }

        let name = match data.get("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
            Some(Value::String(_)) | None | Some(Value::Null) => {
                return Err(ConfigurationError::MissingField("name".to_string()))
            }
            Some(_) => return Err(ConfigurationError::invalid("name", "expected a string")),
        };

        let resource = match data.get("resource") {
            Some(Value::String(resource)) => Some(resource.clone()),
            None | Some(Value::Null) => None,
            Some(_) => {
                return Err(ConfigurationError::invalid(
                    "resource",
                    "expected a string",
                ))
            }
        };

        let mode = data
            .get("mode")
            .ok_or_else(|| ConfigurationError::MissingField("mode".to_string()))?;
        let mode = ModeConfig::from_value(mode)?;

        Ok(Self {
            name,
            resource,
            mode,
            data,
        })
    }

    /// The untouched policy document
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn trigger(&self) -> &Trigger {
        &self.mode.trigger
    }

    pub fn provision_options(&self) -> Option<&ProvisionOptions> {
        self.mode.provision_options.as_ref()
    }
}

/// A single infrastructure template parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterValue {
    pub value: Value,
}

/// Template parameters in parameter-file shape: `name -> {"value": ...}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, ParameterValue>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(
            name.into(),
            ParameterValue {
                value: value.into(),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).map(|p| &p.value)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// A parameter that must be present as a non-empty string
    pub fn require_str(&self, name: &str) -> Result<&str, ConfigurationError> {
        match self.get_str(name) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(ConfigurationError::MissingParameter(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter().map(|(k, p)| (k, &p.value))
    }
}

impl FromIterator<(String, Value)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut set = ParameterSet::new();
        for (name, value) in iter {
            set.insert(name, value);
        }
        set
    }
}

/// Result of one pull-evaluation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Policy that was evaluated
    pub policy: String,
    /// Number of resources that matched the policy filters
    pub resource_count: u64,
    /// Time spent fetching and filtering resources in milliseconds
    pub resource_time_ms: u64,
    /// Time spent running actions in milliseconds
    pub action_time_ms: u64,
    /// Engine-specific output, opaque to the deployment mode
    pub output: Value,
    /// Timestamp of evaluation
    pub executed_at: DateTime<Utc>,
}

impl EvaluationResult {
    pub fn new(policy: impl Into<String>, resource_count: u64, output: Value) -> Self {
        Self {
            policy: policy.into(),
            resource_count,
            resource_time_ms: 0,
            action_time_ms: 0,
            output,
            executed_at: Utc::now(),
        }
    }

    pub fn with_timings(mut self, resource_time_ms: u64, action_time_ms: u64) -> Self {
        self.resource_time_ms = resource_time_ms;
        self.action_time_ms = action_time_ms;
        self
    }

    /// Values in `POLICY_METRICS` order
    pub fn metrics(&self) -> [(&'static str, u64); 3] {
        [
            (POLICY_METRICS[0], self.resource_count),
            (POLICY_METRICS[1], self.resource_time_ms),
            (POLICY_METRICS[2], self.action_time_ms),
        ]
    }
}

/// Request to run a policy's trigger handler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPolicyRequest {
    pub policy: Value,
    #[serde(default)]
    pub event: Option<Value>,
    #[serde(default)]
    pub context: Option<Value>,
}

/// Request to retrieve a policy's function logs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyLogsRequest {
    pub policy: Value,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Response describing a validated policy's execution mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeSummary {
    pub policy: String,
    pub mode: String,
    pub resource: Option<String>,
    pub metrics: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn periodic_policy() -> Value {
        json!({
            "name": "tag-check",
            "resource": "azure.vm",
            "mode": {
                "type": "azure-periodic",
                "schedule": "0 */4 * * *",
                "provision-options": {
                    "servicePlanName": "Ops Plan",
                    "workerSize": 1,
                    "customKnob": "kept"
                }
            },
            "filters": [{"tag:owner": "absent"}]
        })
    }

    #[test]
    fn test_parse_periodic_policy() {
        let policy = PolicyDefinition::from_value(periodic_policy()).unwrap();
        assert_eq!(policy.name, "tag-check");
        assert_eq!(policy.resource.as_deref(), Some("azure.vm"));
        assert_eq!(
            policy.trigger(),
            &Trigger::Periodic {
                schedule: Some("0 */4 * * *".to_string())
            }
        );

        let options = policy.provision_options().unwrap();
        assert_eq!(options.service_plan_name.as_deref(), Some("Ops Plan"));
        assert_eq!(options.extra["customKnob"], "kept");
        assert_eq!(policy.data()["filters"][0]["tag:owner"], "absent");
    }

    #[test]
    fn test_stream_source_defaults_to_activity_log() {
        let policy = PolicyDefinition::from_value(json!({
            "name": "watch",
            "mode": {"type": "azure-stream"}
        }))
        .unwrap();
        assert_eq!(
            policy.trigger(),
            &Trigger::Stream {
                source: DEFAULT_STREAM_SOURCE.to_string()
            }
        );
        assert!(policy.provision_options().is_none());
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let mut doc = periodic_policy();
        doc.as_object_mut().unwrap().remove("name");
        let err = PolicyDefinition::from_value(doc).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingField(f) if f == "name"));
    }

    #[test]
    fn test_missing_mode_is_rejected() {
        let err = PolicyDefinition::from_value(json!({"name": "x"})).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingField(f) if f == "mode"));
    }

    #[test]
    fn test_overrides_use_document_names() {
        let policy = PolicyDefinition::from_value(periodic_policy()).unwrap();
        let overrides = policy.provision_options().unwrap().overrides();
        assert_eq!(overrides["servicePlanName"], "Ops Plan");
        assert_eq!(overrides["workerSize"], 1);
        assert_eq!(overrides["customKnob"], "kept");
        assert!(!overrides.contains_key("location"));
    }

    #[test]
    fn test_parameter_set_serializes_as_parameter_file() {
        let mut params = ParameterSet::new();
        params.insert("name", "my-plan-check");
        params.insert("workerSize", 0);
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value, json!({"name": {"value": "my-plan-check"}, "workerSize": {"value": 0}}));
        assert!(params.require_str("workerSize").is_err());
    }

    #[test]
    fn test_evaluation_metrics_order() {
        let result = EvaluationResult::new("p", 3, Value::Null).with_timings(12, 4);
        let metrics = result.metrics();
        assert_eq!(metrics[0], ("ResourceCount", 3));
        assert_eq!(metrics[1], ("ResourceTime", 12));
        assert_eq!(metrics[2], ("ActionTime", 4));
    }
}
