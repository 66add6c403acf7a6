//! Artifact traits and the package-backed artifact

use async_trait::async_trait;
use policy_functions_core::PolicyDefinition;
use std::sync::Arc;

use crate::{FunctionPackage, PackageError};

/// Remote function host that packages are published to
#[async_trait]
pub trait FunctionHost: Send + Sync {
    /// Whether the target app is healthy enough to take a new package
    async fn is_healthy(&self, target: &str) -> Result<bool, PackageError>;

    /// Upload and activate a package on the target app
    async fn upload(&self, target: &str, package: &FunctionPackage) -> Result<(), PackageError>;
}

/// A built, deployable unit
#[async_trait]
pub trait Artifact: Send + Sync {
    /// Health probe for the target the artifact would be published to
    async fn status(&self, target: &str) -> Result<bool, PackageError>;

    /// Push the artifact to the target
    async fn publish(&self, target: &str) -> Result<(), PackageError>;

    /// Size of the payload `publish` uploads
    fn size_bytes(&self) -> usize;
}

/// Builds a fresh artifact from a policy definition
pub trait ArtifactBuilder: Send + Sync {
    fn build(&self, policy: &PolicyDefinition) -> Result<Box<dyn Artifact>, PackageError>;
}

/// A function package bound to the host it will be published to
pub struct FunctionArtifact {
    package: FunctionPackage,
    host: Arc<dyn FunctionHost>,
}

impl FunctionArtifact {
    pub fn new(package: FunctionPackage, host: Arc<dyn FunctionHost>) -> Self {
        Self { package, host }
    }

    pub fn package(&self) -> &FunctionPackage {
        &self.package
    }
}

#[async_trait]
impl Artifact for FunctionArtifact {
    async fn status(&self, target: &str) -> Result<bool, PackageError> {
        self.host.is_healthy(target).await
    }

    async fn publish(&self, target: &str) -> Result<(), PackageError> {
        tracing::info!(
            "Publishing function {} to {} ({} bytes)",
            self.package.function_name(),
            target,
            self.package.size_bytes()
        );
        self.host.upload(target, &self.package).await
    }

    fn size_bytes(&self) -> usize {
        self.package.size_bytes()
    }
}

/// Default builder: packages the policy and binds it to a host
pub struct PackageBuilder {
    host: Arc<dyn FunctionHost>,
}

impl PackageBuilder {
    pub fn new(host: Arc<dyn FunctionHost>) -> Self {
        Self { host }
    }
}

impl ArtifactBuilder for PackageBuilder {
    fn build(&self, policy: &PolicyDefinition) -> Result<Box<dyn Artifact>, PackageError> {
        let package = FunctionPackage::build(policy)?;
        tracing::debug!(
            "Built package for function {} with {} files",
            package.function_name(),
            package.files().count()
        );
        Ok(Box::new(FunctionArtifact::new(package, self.host.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryFunctionHost;
    use serde_json::json;

    fn policy() -> PolicyDefinition {
        PolicyDefinition::from_value(json!({
            "name": "tag-check",
            "mode": {"type": "azure-periodic", "schedule": "0 */4 * * *"}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_artifact_delegates_to_host() {
        let host = Arc::new(InMemoryFunctionHost::new());
        host.mark_unhealthy("sick-app");
        let builder = PackageBuilder::new(host.clone());

        let artifact = builder.build(&policy()).unwrap();
        assert!(artifact.size_bytes() > 0);
        assert!(artifact.status("ops-plan-tag-check").await.unwrap());
        assert!(!artifact.status("sick-app").await.unwrap());

        artifact.publish("ops-plan-tag-check").await.unwrap();
        let uploads = host.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].target, "ops-plan-tag-check");
        assert_eq!(uploads[0].function_name, "tag-check");
        assert_eq!(uploads[0].size_bytes, artifact.size_bytes());
    }

    #[test]
    fn test_build_has_no_host_side_effects() {
        let host = Arc::new(InMemoryFunctionHost::new());
        let builder = PackageBuilder::new(host.clone());
        builder.build(&policy()).unwrap();
        builder.build(&policy()).unwrap();
        assert!(host.uploads().is_empty());
        assert!(host.status_checks().is_empty());
    }
}
