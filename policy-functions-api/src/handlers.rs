//! API request handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use policy_functions_core::{ModeSummary, PolicyLogsRequest, RunPolicyRequest};
use policy_functions_executor::ExecutionMode;
use policy_functions_templates::ParameterResolver;
use serde_json::Value;
use std::sync::Arc;

use crate::{ApiError, AppState};

fn bind(state: &AppState, policy: Value) -> Result<ExecutionMode, ApiError> {
    Ok(ExecutionMode::from_value(policy, state.services.clone())?)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "policy-functions",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ==================== Deployment Handlers ====================

/// Validate a policy's mode configuration without touching any backend
pub async fn validate_policy(
    State(state): State<Arc<AppState>>,
    Json(policy): Json<Value>,
) -> Result<Json<ModeSummary>, ApiError> {
    let mode = bind(&state, policy)?;
    mode.validate()?;

    let policy = mode.policy();
    Ok(Json(ModeSummary {
        policy: policy.name.clone(),
        mode: mode.name().to_string(),
        resource: policy.resource.clone(),
        metrics: mode.metrics().iter().map(|m| m.to_string()).collect(),
    }))
}

/// Provision the policy's function app and publish the policy to it
pub async fn provision_policy(
    State(state): State<Arc<AppState>>,
    Json(policy): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let mode = bind(&state, policy)?;
    let overrides = ParameterResolver::overrides(mode.policy())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let target = overrides
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(mode.policy().name.as_str())
        .to_string();

    let lock = state.target_lock(&target);
    let _guard = lock.lock().await;

    tracing::info!("Provisioning policy {} to {}", mode.policy().name, target);
    let outcome = mode.provision().await?;
    Ok((StatusCode::OK, Json(outcome)))
}

// ==================== Trigger Handlers ====================

/// Handle a trigger invocation forwarded by the function host
pub async fn run_policy(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RunPolicyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mode = bind(&state, request.policy)?;
    let result = mode.run(request.event, request.context).await?;
    Ok(Json(result))
}

/// Retrieve a policy's function logs
pub async fn get_policy_logs(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PolicyLogsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mode = bind(&state, request.policy)?;
    let logs = mode.get_logs(request.start, request.end).await?;
    Ok(Json(logs))
}
