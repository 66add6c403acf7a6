//! Error types for the core crate

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Unknown execution mode: {0}")]
    UnknownMode(String),

    #[error("Additional property {property} is not allowed in mode {mode}")]
    UnknownProperty { mode: String, property: String },

    #[error("Missing template parameter: {0}")]
    MissingParameter(String),
}

impl ConfigurationError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigurationError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
