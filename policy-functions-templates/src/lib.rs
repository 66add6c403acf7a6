//! Infrastructure templates for Policy Functions
//!
//! Resolves template parameters from a policy definition and makes sure
//! the function app hosting a policy exists. The template backend is a
//! trait; an in-memory implementation is provided for development and
//! testing.

pub mod error;
pub mod memory;
pub mod parameters;
pub mod provisioner;
pub mod traits;

pub use error::TemplateError;
pub use memory::{DeploymentRecord, InMemoryTemplateService};
pub use parameters::{ParameterResolver, REQUIRED_PARAMETERS};
pub use provisioner::{ProvisionState, ProvisionerConfig, ResourceProvisioner};
pub use traits::{
    DeploymentOutcome, ExistingResourceInfo, ProvisioningHandle, TemplateService,
    DEFAULT_PARAMETERS_TEMPLATE, FUNCTION_APP_TEMPLATE,
};
