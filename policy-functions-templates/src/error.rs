//! Template error types

use policy_functions_core::ConfigurationError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Resource group error: {0}")]
    ResourceGroup(String),

    #[error("Deployment {deployment} failed: {reason}")]
    Deployment { deployment: String, reason: String },

    #[error("Deployment {deployment} did not complete within {timeout:?}")]
    Timeout {
        deployment: String,
        timeout: Duration,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}
