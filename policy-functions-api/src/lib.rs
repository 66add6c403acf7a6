//! Policy Functions API Server
//!
//! HTTP surface through which deploy pipelines provision policies and the
//! function host invokes their triggers.

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use state::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Deployment
        .route("/api/validate", post(handlers::validate_policy))
        .route("/api/provision", post(handlers::provision_policy))
        // Trigger handling
        .route("/api/run", post(handlers::run_policy))
        .route("/api/logs", post(handlers::get_policy_logs))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
