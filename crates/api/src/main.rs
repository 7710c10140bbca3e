mod config;
mod routes;

use anyhow::{Context, Result};
use pipeline::ConceptMapPipeline;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;
use crate::routes::{AppState, router};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    tracing::info!(
        mode = ?config.mode,
        llm = %config.llm.base_url,
        text_model = %config.llm.text_model,
        vision_model = %config.llm.vision_model,
        backend = ?config.render.backend,
        "Loaded configuration"
    );

    let pipeline = ConceptMapPipeline::new(
        Arc::new(config.text_client()),
        Arc::new(config.vision_client()),
        config.pipeline_config(),
    );

    let state = Arc::new(AppState {
        pipeline,
        text_model: config.llm.text_model.clone(),
        vision_model: config.llm.vision_model.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    tracing::info!("Server listening on http://{}", config.bind_addr);

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;

    Ok(())
}
