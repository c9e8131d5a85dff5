//! HTTP API for health checks, batch status, and metrics

use crate::batch::BatchStatus;
use crate::config::ApiConfig;
use crate::events::BatchProgress;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub status: Arc<RwLock<StatusSnapshot>>,
    pub metrics_enabled: bool,
}

impl AppState {
    pub fn new(metrics_enabled: bool) -> Self {
        Self {
            status: Arc::new(RwLock::new(StatusSnapshot::default())),
            metrics_enabled,
        }
    }
}

/// Latest view of the running batch, folded from progress events
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub batch_id: Option<Uuid>,
    pub phase: Phase,
    pub requested: u32,
    pub current_index: Option<u32>,
    pub accepted: u32,
    pub attempts: u32,
    pub last_nonce: Option<u64>,
    pub last_tx_id: Option<String>,
    pub pending_count: Option<u32>,
    pub outcome: Option<BatchStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Submitting,
    Waiting,
    CoolingDown,
    Finished,
}

impl StatusSnapshot {
    pub fn apply(&mut self, event: &BatchProgress) {
        match event {
            BatchProgress::Started {
                batch_id, count, ..
            } => {
                *self = StatusSnapshot {
                    batch_id: Some(*batch_id),
                    phase: Phase::Submitting,
                    requested: *count,
                    ..Default::default()
                };
            }
            BatchProgress::Waiting {
                index,
                pending_count,
                ..
            } => {
                self.phase = Phase::Waiting;
                self.current_index = Some(*index);
                self.pending_count = Some(*pending_count);
            }
            BatchProgress::CoolingDown { index, .. } => {
                self.phase = Phase::CoolingDown;
                self.current_index = Some(*index);
            }
            BatchProgress::Attempt {
                index,
                nonce,
                outcome,
                ..
            } => {
                self.phase = Phase::Submitting;
                self.current_index = Some(*index);
                self.attempts += 1;
                self.last_nonce = Some(*nonce);
                if let Some(tx_id) = outcome.tx_id() {
                    self.accepted += 1;
                    self.last_tx_id = Some(tx_id.to_string());
                }
            }
            BatchProgress::Finished {
                status, accepted, ..
            } => {
                self.phase = Phase::Finished;
                self.accepted = *accepted;
                self.outcome = Some(status.clone());
            }
        }
    }
}

/// Fold progress events into the shared snapshot until the channel closes
pub fn spawn_status_tracker(
    mut events: broadcast::Receiver<BatchProgress>,
    status: Arc<RwLock<StatusSnapshot>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    debug!("Progress: {}", event.name());
                    status.write().await.apply(&event);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Status tracker lagged, {} events dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(get_status))
        .route("/metrics", get(get_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, state: AppState) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API server to {}", addr))?;
    axum::serve(listener, router(state))
        .await
        .context("API server terminated")?;

    Ok(())
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Current batch progress
async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.status.read().await.clone())
}

/// Prometheus exposition, if enabled
async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    if !state.metrics_enabled {
        return (StatusCode::NOT_FOUND, "metrics disabled".to_string()).into_response();
    }
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::render(),
    )
        .into_response()
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}
