//! Policy Functions - Main Application Entry Point
//!
//! Provisions serverless function apps for cloud governance policies and
//! dispatches their timer and event triggers.

use anyhow::Context;
use policy_functions_api::{AppState, ServerConfig};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,policy_functions=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!("Starting Policy Functions server on {}", config.bind_address());
    tracing::info!(
        "Deployments default to {} with a {}s timeout",
        config.default_location,
        config.deployment_timeout.as_secs()
    );

    let app_state = Arc::new(AppState::from_config(&config));
    let app = policy_functions_api::create_router(app_state);

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;

    tracing::info!("Server listening on http://{}", config.bind_address());

    axum::serve(listener, app).await?;

    Ok(())
}
