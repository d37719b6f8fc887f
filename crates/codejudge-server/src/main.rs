mod error;
mod extract;
mod routes;
mod state;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use codejudge_core::CodeJudgeConfig;
use codejudge_pipeline::{CancellationToken, Orchestrator};
use codejudge_store::SqliteSubmissionStore;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = CodeJudgeConfig::from_env()?;
    let store = SqliteSubmissionStore::open(Path::new(&config.store.db_path))?;
    let orchestrator = Orchestrator::from_config(&config, Some(Arc::new(store)))?;

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(orchestrator, shutdown.clone()));
    let app = routes::router(state);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down, cancelling in-flight runs");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
