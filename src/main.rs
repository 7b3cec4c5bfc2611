//! Embedding Server Main
//!
//! Entry point: load config, set up tracing, load the model, serve.

use sentence_embed_server::{EmbeddingServer, ServerConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = ServerConfig::load()?;

    // Initialize tracing, RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.monitoring.filter_directive().into()),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .init();

    info!("🚀 Sentence Embedding Server v{}", env!("CARGO_PKG_VERSION"));
    info!("📊 Log Level: {}", config.monitoring.log_level);
    info!(
        "🧠 Model: {} ({} backend)",
        config.embedding.model, config.embedding.backend
    );

    // Model load happens before bind; a failure exits without serving
    let server = EmbeddingServer::new(config).await?;

    info!("📡 Ready to accept embedding requests");
    info!("🛑 Press Ctrl+C to stop");

    server.start().await?;

    Ok(())
}
