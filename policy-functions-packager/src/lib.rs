//! Policy Functions Packager
//!
//! Builds a deployable function package from a policy definition and
//! publishes it to a function host once the host reports healthy.

pub mod artifact;
pub mod error;
pub mod memory;
pub mod package;

pub use artifact::{Artifact, ArtifactBuilder, FunctionArtifact, FunctionHost, PackageBuilder};
pub use error::PackageError;
pub use memory::{InMemoryFunctionHost, UploadRecord};
pub use package::FunctionPackage;
