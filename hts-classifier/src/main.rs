//! hts-classifier - Tariff classification service
//!
//! Loads the tariff catalog snapshots, wires the oracle and remote lookup
//! clients, and serves `POST /classify` and `GET /health`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hts_classifier::funnel::Funnel;
use hts_classifier::services::{
    BatchOrchestrator, DutyRateClient, GeminiClient, JsonReportSink, RateResolver, SuggestionClient,
};
use hts_classifier::utils::RetryPolicy;
use hts_classifier::AppState;
use hts_common::catalog::load_candidate_index;
use hts_common::config::{config_file_path, load_toml_config, AppConfig};

/// Command-line arguments for hts-classifier
#[derive(Parser, Debug)]
#[command(name = "hts-classifier")]
#[command(about = "Tariff schedule classification service")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "HTS_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting hts-classifier");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = config_file_path(args.config.as_deref());
    let toml_config = load_toml_config(&config_path)
        .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
    let config = AppConfig::resolve(&toml_config).context("Invalid configuration")?;

    // A catalog that fails to build is never served
    let index = Arc::new(load_candidate_index(&config.catalog).context("Failed to load tariff catalog")?);
    let full_codes = index.indexes().full_codes.len();
    info!(
        short_codes = index.indexes().short_codes.len(),
        full_codes,
        chapters = index.chapters().len(),
        "Catalog ready"
    );

    let oracle = Arc::new(GeminiClient::new(&config.oracle).context("Failed to build oracle client")?);
    let rates = Arc::new(DutyRateClient::new(&config.duty_rates).context("Failed to build duty-rate client")?);
    let suggester =
        Arc::new(SuggestionClient::new(&config.suggestions).context("Failed to build suggestion client")?);

    let funnel = Funnel::new(
        index.clone(),
        oracle.clone(),
        oracle,
        RetryPolicy::new(config.oracle.max_attempts),
    );
    let orchestrator = BatchOrchestrator::new(
        funnel,
        Arc::new(RateResolver::new(index, rates)),
        suggester,
        config.duty_rates.destination_country.clone(),
        config.batch.max_concurrent_items,
    );
    let report_sink = Arc::new(JsonReportSink::new(config.reports_dir.clone()));
    info!(reports_dir = %config.reports_dir.display(), "Reports directory");

    let state = AppState::new(Arc::new(orchestrator), report_sink, full_codes);
    let app = hts_classifier::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind_address, config.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
