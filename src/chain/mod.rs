//! Chain module - network access for the broadcaster
//!
//! This module provides:
//! - The [`Transport`] seam the hosting application implements
//! - [`ChainProbe`], read-only sequencing and mempool queries
//! - [`HiroTransport`], an HTTP transport with API URL failover

pub mod probe;
pub mod provider;

pub use probe::ChainProbe;
pub use provider::HiroTransport;

use async_trait::async_trait;
use thiserror::Error;

/// Account sequencing state as reported by the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountState {
    /// Next nonce the network expects from this sender
    pub nonce: u64,
    /// Sender's transactions accepted but not yet finalized.
    /// `None` when the mempool could not be read.
    pub pending_count: Option<u32>,
}

/// Raw broadcast response payload
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubmitResponse {
    pub accepted: bool,
    pub tx_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl SubmitResponse {
    pub fn accepted(tx_id: impl Into<String>) -> Self {
        Self {
            accepted: true,
            tx_id: Some(tx_id.into()),
            ..Default::default()
        }
    }

    pub fn rejected(error_code: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            error_code: Some(error_code.into()),
            error_message: Some(error_message.into()),
            ..Default::default()
        }
    }
}

/// The transport round trip itself failed (as opposed to returning an error payload)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Rate limited by API")]
    RateLimited,

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// Network transport provided by the hosting application
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Broadcast a signed transaction
    async fn submit_raw(&self, signed_tx: Vec<u8>) -> Result<SubmitResponse, TransportError>;

    /// Query the sender's nonce and pending depth
    async fn query_account(&self, address: &str) -> Result<AccountState, TransportError>;
}
