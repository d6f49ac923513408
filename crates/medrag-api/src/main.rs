//! MedRAG API Server
//!
//! Serves the medical chatbot over HTTP.
//!
//! Author: hephaex@gmail.com

use anyhow::Context;
use medrag_api::{create_router, state::AppState};
use medrag_core::config::{AppConfig, LoggingConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let level = &logging.level;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "medrag_api={level},medrag_rag={level},medrag_vector={level},tower_http={level}"
        )
        .into()
    });

    if logging.json_format {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging);

    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = tokio::task::spawn_blocking(move || AppState::bootstrap(config))
        .await
        .context("Startup task failed")?
        .context("Failed to initialize application state")?;
    let app = create_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("MedRAG API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
