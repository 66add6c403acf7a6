//! Execution modes for serverless policies
//!
//! Provisions a policy's function app, publishes its package and
//! dispatches trigger invocations for the periodic and stream modes.

pub mod deployer;
pub mod error;
pub mod evaluator;
pub mod mode;

pub use deployer::{DeployResult, Deployer};
pub use error::ModeError;
pub use evaluator::{PullEvaluator, StaticEvaluator};
pub use mode::{ExecutionMode, ModeServices, PeriodicMode, ProvisionOutcome, StreamMode};
