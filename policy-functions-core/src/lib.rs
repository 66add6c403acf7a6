//! Core domain models for Policy Functions
//!
//! This crate contains the shared data structures used across the
//! serverless deployment mode: PolicyDefinition, ModeConfig,
//! ProvisionOptions, ParameterSet and EvaluationResult.

pub mod error;
pub mod models;
pub mod schema;

pub use error::ConfigurationError;
pub use models::*;
