use std::sync::Arc;

use dompet_ingest::{IngestPipeline, OpenAiExtractor, PdfTextExtractor};
use dompet_server::{build_router, AppState, ServerConfig};
use dompet_storage::JsonStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,dompet=debug")),
        )
        .init();

    info!("Starting dompet server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load()?;
    info!(?config, "Loaded configuration");

    let store = Arc::new(JsonStore::new(config.db_path.clone(), config.on_corrupt));
    // Seeds the file on first run and surfaces corruption before serving.
    let existing = store.transaction_count().await?;
    info!(path = %store.path().display(), transactions = existing, "Store ready");

    let api_key = config.openai_api_key.clone().unwrap_or_default();
    if api_key.is_empty() {
        warn!("OPENAI_API_KEY is not set; uploads will fail until it is configured");
    }
    let llm = OpenAiExtractor::new(api_key)
        .with_model(config.model.clone())
        .with_base_url(config.openai_base_url.clone());

    let pipeline = IngestPipeline::new(store, PdfTextExtractor, llm, config.ingest_settings());
    let app = build_router(AppState::new(pipeline), &config);

    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    info!(addr = %config.http_addr, "Starting HTTP API server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, shutting down");
            }
        })
        .await?;

    Ok(())
}
