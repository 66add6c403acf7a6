//! Packaging error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Policy {0} has no schedule for its timer trigger")]
    MissingSchedule(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Function host error: {0}")]
    Host(String),
}
