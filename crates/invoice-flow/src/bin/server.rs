//! Invoice extraction server binary
//!
//! Run with: cargo run -p invoice-flow --bin invoice-flow-server

use std::sync::Arc;

use invoice_flow::config::Config;
use invoice_flow::processing::{BatchProcessor, IntakeSweeper};
use invoice_flow::providers::{ClaudeExtractor, CsvReportExporter, DocumentExtractor};
use invoice_flow::server::{state::AppState, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "invoice_flow=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔════════════════════════════════════════════════════════╗
║                     Invoice Flow                       ║
║        Rate-Limited Batch Invoice Extraction           ║
╚════════════════════════════════════════════════════════╝
"#
    );

    let config = Config::default();

    tracing::info!("Configuration loaded");
    tracing::info!("  - Extraction model: {}", config.extraction.model);
    tracing::info!(
        "  - Inter-job delay: {:.1}s",
        config.processing.delay_between_jobs_secs
    );
    tracing::info!("  - Input directory: {}", config.storage.input_dir.display());
    tracing::info!("  - Reports directory: {}", config.storage.reports_dir.display());
    tracing::info!(
        "  - Processed directory: {}",
        config.storage.processed_dir.display()
    );

    config.storage.ensure_dirs()?;

    let extractor = Arc::new(ClaudeExtractor::new(&config.extraction)?);
    if !extractor.has_api_key() {
        tracing::warn!("ANTHROPIC_API_KEY is not set; extraction jobs will fail until it is");
    }
    tracing::info!("Extraction provider: {}", extractor.name());

    let processor = BatchProcessor::new(
        &config.processing,
        &config.storage,
        extractor,
        Arc::new(CsvReportExporter::new()),
    );

    if config.intake.enabled {
        IntakeSweeper::new(
            processor.clone(),
            config.storage.input_dir.clone(),
            &config.intake,
        )
        .spawn();
    }

    let state = AppState::new(config.clone(), processor);
    let server = Server::new(config, state);

    println!("Server starting...");
    println!("  API:    http://{}/api", server.address());
    println!("  Health: http://{}/health", server.address());
    println!();
    println!("Endpoints:");
    println!("  POST /api/upload          - Queue a single PDF");
    println!("  POST /api/batch/upload    - Queue a batch of PDFs");
    println!("  GET  /api/batch/:id       - Batch progress");
    println!("  GET  /api/batch/:id/results - Aggregated results");
    println!("  POST /api/batch/:id/cancel  - Cancel pending jobs");
    println!("  GET  /api/queue/status    - Queue health");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    server.start().await?;

    Ok(())
}
