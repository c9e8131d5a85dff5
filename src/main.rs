//! STX Batch Broadcaster - submits one configured batch and exits
//!
//! Loads settings, runs the batch against the configured API nodes and prints
//! the batch result as JSON. Ctrl+C stops the batch between attempts.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use stx_batch_broadcaster::api::{self, AppState};
use stx_batch_broadcaster::signer::RemoteSigner;
use stx_batch_broadcaster::{BatchRunner, HiroTransport, SenderIdentity, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting STX Batch Broadcaster v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for {:?} with {} API URL(s)",
        settings.network.name,
        settings.network.api_urls.len()
    );

    // Network transport and signer
    let transport = Arc::new(HiroTransport::new(settings.network.clone())?);
    let signer = Arc::new(RemoteSigner::new(&settings.signer, settings.network.name));
    let identity = SenderIdentity::new(settings.signer.address.clone(), signer);

    let runner = BatchRunner::new(settings.broadcaster.clone(), transport)?;

    // Status API, fed from batch progress
    let api_handles = if settings.api.enabled {
        let state = AppState::new(settings.metrics.enabled);
        let tracker = api::spawn_status_tracker(runner.subscribe(), state.status.clone());
        let config = settings.api.clone();
        let server = tokio::spawn(async move {
            if let Err(e) = api::run_server(config, state).await {
                error!("API server error: {}", e);
            }
        });
        info!(
            "API server: http://{}:{}",
            settings.api.host, settings.api.port
        );
        Some((tracker, server))
    } else {
        None
    };

    // Stop between attempts on shutdown
    let shutdown_handle = tokio::spawn({
        let cancel = runner.cancel_handle();
        async move {
            shutdown_signal().await;
            warn!("Shutdown signal received, stopping after the current attempt");
            cancel.cancel().await;
        }
    });

    let result = runner
        .run(
            &settings.batch.transaction,
            settings.batch.count,
            &identity,
        )
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    shutdown_handle.abort();
    if let Some((tracker, server)) = api_handles {
        tracker.abort();
        server.abort();
    }

    // Non-zero exit for scripted callers when the batch did not finish
    if let Some(error) = result.abort_error() {
        anyhow::bail!(
            "Batch stopped early ({}/{} accepted): {}",
            result.accepted_count(),
            result.requested,
            error
        );
    }

    info!("Batch completed: {} transactions accepted", result.accepted_count());
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,stx_batch_broadcaster=debug,hyper=warn,reqwest=warn")
    });

    // Stdout carries the batch result, so logs go to stderr
    let json = std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false);
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
