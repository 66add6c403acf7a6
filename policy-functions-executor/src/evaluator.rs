//! Pull-based evaluation entry point

use async_trait::async_trait;
use policy_functions_core::{EvaluationResult, PolicyDefinition};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The evaluation engine's pull mode: fetch the resources a policy
/// targets, filter them and run its actions
#[async_trait]
pub trait PullEvaluator: Send + Sync {
    async fn evaluate(&self, policy: &PolicyDefinition) -> anyhow::Result<EvaluationResult>;
}

/// Evaluator that reports a fixed resource count, for development and testing
#[derive(Debug, Default)]
pub struct StaticEvaluator {
    resource_count: u64,
    output: Value,
    runs: AtomicUsize,
}

impl StaticEvaluator {
    pub fn new(resource_count: u64, output: Value) -> Self {
        Self {
            resource_count,
            output,
            runs: AtomicUsize::new(0),
        }
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PullEvaluator for StaticEvaluator {
    async fn evaluate(&self, policy: &PolicyDefinition) -> anyhow::Result<EvaluationResult> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(EvaluationResult::new(
            policy.name.clone(),
            self.resource_count,
            self.output.clone(),
        ))
    }
}
