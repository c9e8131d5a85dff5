//! HTTP transport against Stacks API nodes with multi-URL failover

use super::{AccountState, SubmitResponse, Transport, TransportError};
use crate::config::NetworkConfig;
use crate::error::{BroadcastError, BroadcastResult};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct NoncesResponse {
    possible_next_nonce: u64,
}

#[derive(Debug, Deserialize)]
struct MempoolResponse {
    total: u32,
}

/// Error payload returned by `/v2/transactions` on rejection
#[derive(Debug, Deserialize)]
struct RejectionBody {
    error: Option<String>,
    reason: Option<String>,
}

/// Transport backed by one or more API nodes
pub struct HiroTransport {
    /// Network configuration
    config: NetworkConfig,
    /// Shared HTTP client
    client: Client,
    /// Current active URL index
    current_url: AtomicUsize,
}

impl HiroTransport {
    /// Create a new transport
    pub fn new(config: NetworkConfig) -> BroadcastResult<Self> {
        if config.api_urls.is_empty() {
            return Err(BroadcastError::Configuration(
                "No API URLs configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| BroadcastError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            current_url: AtomicUsize::new(0),
        })
    }

    /// Get the active API base URL
    pub fn base_url(&self) -> &str {
        let idx = self.current_url.load(Ordering::Relaxed);
        self.config.api_urls[idx % self.config.api_urls.len()].trim_end_matches('/')
    }

    /// Switch to next available URL
    pub fn failover(&self) {
        if self.config.api_urls.len() < 2 {
            return;
        }
        let current = self.current_url.load(Ordering::Relaxed);
        let next = (current + 1) % self.config.api_urls.len();
        self.current_url.store(next, Ordering::Relaxed);
        warn!("{:?} API failover to {}", self.config.name, self.base_url());
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, TransportError> {
        let resp = self.client.get(&url).send().await.map_err(classify)?;

        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(TransportError::RateLimited);
        }

        resp.error_for_status()
            .map_err(classify)?
            .json::<T>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }

    async fn fetch_account(&self, address: &str) -> Result<AccountState, TransportError> {
        let base = self.base_url();
        let nonces = self.get_json::<NoncesResponse>(format!(
            "{base}/extended/v1/address/{address}/nonces"
        ));
        let mempool = self.get_json::<MempoolResponse>(format!(
            "{base}/extended/v1/address/{address}/mempool?limit=1"
        ));

        let (nonces, mempool) = tokio::join!(nonces, mempool);
        let nonces = nonces?;

        let pending_count = match mempool {
            Ok(m) => Some(m.total),
            Err(e) => {
                debug!("Mempool query for {} failed: {}", address, e);
                None
            }
        };

        Ok(AccountState {
            nonce: nonces.possible_next_nonce,
            pending_count,
        })
    }
}

#[async_trait]
impl Transport for HiroTransport {
    async fn submit_raw(&self, signed_tx: Vec<u8>) -> Result<SubmitResponse, TransportError> {
        let url = format!("{}/v2/transactions", self.base_url());

        let resp = match self
            .client
            .post(&url)
            .header("Content-Type", "application/octet-stream")
            .body(signed_tx)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                self.failover();
                return Err(classify(e));
            }
        };

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        parse_submit_response(status, &body).map_err(|e| {
            if matches!(e, TransportError::Network(_)) {
                self.failover();
            }
            e
        })
    }

    async fn query_account(&self, address: &str) -> Result<AccountState, TransportError> {
        let mut last_error = TransportError::Network("no API URLs".to_string());

        for _ in 0..self.config.api_urls.len() {
            match self.fetch_account(address).await {
                Ok(state) => return Ok(state),
                Err(TransportError::RateLimited) => return Err(TransportError::RateLimited),
                Err(e) => {
                    warn!("Account query via {} failed: {}", self.base_url(), e);
                    last_error = e;
                    self.failover();
                }
            }
        }

        Err(last_error)
    }
}

/// Map a broadcast HTTP response onto the transport contract
fn parse_submit_response(status: StatusCode, body: &str) -> Result<SubmitResponse, TransportError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(TransportError::RateLimited);
    }

    if status.is_success() {
        // Success body is the txid as a JSON string
        let tx_id = serde_json::from_str::<String>(body)
            .unwrap_or_else(|_| body.trim().trim_matches('"').to_string());
        return Ok(SubmitResponse::accepted(tx_id));
    }

    if status.is_client_error() {
        let rejection: RejectionBody = serde_json::from_str(body)
            .map_err(|e| TransportError::Decode(format!("{} ({})", e, status)))?;

        let message = rejection.error.unwrap_or_else(|| status.to_string());
        if message.to_lowercase().contains("rate limit") {
            return Err(TransportError::RateLimited);
        }

        return Ok(SubmitResponse {
            accepted: false,
            tx_id: None,
            error_code: rejection.reason,
            error_message: Some(message),
        });
    }

    Err(TransportError::Network(format!("{}: {}", status, body)))
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.status() == Some(StatusCode::TOO_MANY_REQUESTS) {
        TransportError::RateLimited
    } else {
        TransportError::Network(e.to_string())
    }
}
