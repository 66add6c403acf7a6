//! Function package contents

use policy_functions_core::{normalize_resource_name, PolicyDefinition, Trigger};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::PackageError;

/// Runtime version written to `host.json`
const HOST_VERSION: &str = "2.0";

/// Binding name the evaluation handler reads its trigger payload from
const INPUT_BINDING: &str = "input";

/// A built function package: a sorted map of relative path to file bytes
///
/// Layout:
/// - `host.json`
/// - `<function>/function.json` with the trigger binding
/// - `<function>/config.json` with the policy document
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionPackage {
    function_name: String,
    files: BTreeMap<String, Vec<u8>>,
}

impl FunctionPackage {
    /// Build the package for a policy
    ///
    /// Purely local: nothing here talks to a host, so a failed build can be
    /// retried freely.
    pub fn build(policy: &PolicyDefinition) -> Result<Self, PackageError> {
        let function_name = Self::function_dir(&policy.name);
        let mut files = BTreeMap::new();

        files.insert(
            "host.json".to_string(),
            serde_json::to_vec_pretty(&json!({ "version": HOST_VERSION }))?,
        );

        let function_json = json!({
            "bindings": [Self::binding(policy)?],
            "disabled": false
        });
        files.insert(
            format!("{}/function.json", function_name),
            serde_json::to_vec_pretty(&function_json)?,
        );

        let config_json = json!({ "policies": [policy.data()] });
        files.insert(
            format!("{}/config.json", function_name),
            serde_json::to_vec_pretty(&config_json)?,
        );

        Ok(Self {
            function_name,
            files,
        })
    }

    fn binding(policy: &PolicyDefinition) -> Result<Value, PackageError> {
        match policy.trigger() {
            Trigger::Periodic { schedule } => {
                let schedule = schedule
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| PackageError::MissingSchedule(policy.name.clone()))?;
                Ok(json!({
                    "name": INPUT_BINDING,
                    "type": "timerTrigger",
                    "direction": "in",
                    "schedule": schedule
                }))
            }
            Trigger::Stream { source } => Ok(json!({
                "name": INPUT_BINDING,
                "type": "eventGridTrigger",
                "direction": "in",
                "source": source
            })),
        }
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(path, bytes)| (path.as_str(), bytes.as_slice()))
    }

    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// Directory name for a policy's function
    ///
    /// Anything other than ASCII letters, digits, `-` and `_` becomes `-`, so
    /// the name is always a single path segment.
    fn function_dir(policy_name: &str) -> String {
        normalize_resource_name(policy_name)
            .chars()
            .map(|c| match c {
                'a'..='z' | '0'..='9' | '-' | '_' => c,
                _ => '-',
            })
            .collect()
    }

    /// Total size of all file contents in bytes
    pub fn size_bytes(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}
