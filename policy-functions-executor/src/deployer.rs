//! Health-gated publishing

use policy_functions_packager::{Artifact, PackageError};

/// Outcome of a deploy attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployResult {
    /// The target was healthy and the artifact was published
    Published,
    /// The target failed its health probe; nothing was published
    Aborted,
}

pub struct Deployer;

impl Deployer {
    /// Publish `artifact` to `target` if the target reports healthy
    pub async fn deploy(artifact: &dyn Artifact, target: &str) -> Result<DeployResult, PackageError> {
        if !artifact.status(target).await? {
            tracing::error!("Aborted deployment, ensure Application Service is healthy.");
            return Ok(DeployResult::Aborted);
        }

        artifact.publish(target).await?;
        Ok(DeployResult::Published)
    }
}
