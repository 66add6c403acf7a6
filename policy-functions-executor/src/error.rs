//! Execution mode error types

use policy_functions_core::ConfigurationError;
use policy_functions_packager::PackageError;
use policy_functions_templates::TemplateError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModeError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Provisioning failed: {0}")]
    Provisioning(TemplateError),

    #[error("Deployment {deployment} did not complete within {timeout:?}")]
    ProvisioningTimeout { deployment: String, timeout: Duration },

    #[error("Aborted deployment to {target}, ensure Application Service is healthy")]
    UnhealthyTarget { target: String },

    #[error("Packaging error: {0}")]
    Packaging(#[from] PackageError),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("{operation} is not supported in {mode} mode")]
    Unsupported {
        operation: &'static str,
        mode: &'static str,
    },
}

impl ModeError {
    pub fn is_unsupported(&self) -> bool {
        matches!(self, ModeError::Unsupported { .. })
    }
}

impl From<TemplateError> for ModeError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::Configuration(err) => ModeError::Configuration(err),
            TemplateError::Timeout {
                deployment,
                timeout,
            } => ModeError::ProvisioningTimeout {
                deployment,
                timeout,
            },
            _ => ModeError::Provisioning(err),
        }
    }
}
