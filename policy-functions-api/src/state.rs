//! Application state shared across handlers

use parking_lot::Mutex;
use policy_functions_executor::{ModeServices, StaticEvaluator};
use policy_functions_packager::{InMemoryFunctionHost, PackageBuilder};
use policy_functions_templates::{InMemoryTemplateService, ProvisionerConfig};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::ServerConfig;

/// Shared application state
pub struct AppState {
    pub services: Arc<ModeServices>,
    /// One lock per function app so concurrent provisions of the same
    /// target run one after the other. Entries live only while a request
    /// holds the lock.
    provision_locks: Mutex<HashMap<String, Weak<tokio::sync::Mutex<()>>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::from_config(&ServerConfig::default())
    }

    /// In-memory backends configured from the server settings
    pub fn from_config(config: &ServerConfig) -> Self {
        let templates = Arc::new(InMemoryTemplateService::with_location(&config.default_location));
        let builder = Arc::new(PackageBuilder::new(Arc::new(InMemoryFunctionHost::new())));
        let evaluator = Arc::new(StaticEvaluator::new(0, json!([])));

        let services = ModeServices::new(templates, builder, evaluator).with_provisioner(
            ProvisionerConfig {
                deployment_timeout: config.deployment_timeout,
                ..ProvisionerConfig::default()
            },
        );
        Self::with_services(Arc::new(services))
    }

    /// Create with custom collaborators
    pub fn with_services(services: Arc<ModeServices>) -> Self {
        Self {
            services,
            provision_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Lock guarding provisioning of `target`
    pub fn target_lock(&self, target: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.provision_locks.lock();
        locks.retain(|_, lock| lock.strong_count() > 0);

        if let Some(lock) = locks.get(target).and_then(Weak::upgrade) {
            return lock;
        }
        let lock = Arc::new(tokio::sync::Mutex::new(()));
        locks.insert(target.to_string(), Arc::downgrade(&lock));
        lock
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
