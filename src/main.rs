//! OVM Batch Submitter - sequencer and state batch submission to L1
//!
//! Serves the batch commands over HTTP and submits the resulting transactions
//! to the configured ledger node.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use ovm_batch_submitter::api::{self, AppState};
use ovm_batch_submitter::commands::{BatchSubmitter, CommandRegistry};
use ovm_batch_submitter::config::Settings;
use ovm_batch_submitter::metrics::MetricsServer;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting OVM Batch Submitter v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration with {} ledger endpoints and {} wallets",
        settings.ledger.rpc_urls.len(),
        settings.wallets.len()
    );

    let submitter = Arc::new(BatchSubmitter::from_settings(&settings)?);
    let registry = CommandRegistry::builder().register_all(submitter)?.build()?;

    let shutdown = CancellationToken::new();

    // Start API server
    let api_handle = tokio::spawn({
        let state = AppState {
            registry: Arc::new(registry),
            request_timeout: settings.ledger.request_timeout(),
        };
        let config = settings.api.clone();
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = api::run_server(config, state, shutdown).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    info!("OVM Batch Submitter is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    // In-flight requests finish or hit their deadline
    shutdown.cancel();
    if let Err(e) = api_handle.await {
        error!("API server task failed: {}", e);
    }
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("OVM Batch Submitter stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ovm_batch_submitter=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
