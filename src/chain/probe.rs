//! Read-only sequencing and mempool queries

use super::{AccountState, Transport};
use crate::error::{BroadcastError, BroadcastResult};

use std::sync::Arc;
use tracing::{debug, warn};

/// Queries account sequencing state and pending depth.
///
/// A failed pending-depth query degrades to a configured congested value so
/// that admission control stalls instead of flooding. A failed nonce query is
/// always surfaced: there is no safe default for sequencing.
pub struct ChainProbe {
    transport: Arc<dyn Transport>,
    pending_fallback: u32,
}

impl ChainProbe {
    pub fn new(transport: Arc<dyn Transport>, pending_fallback: u32) -> Self {
        Self {
            transport,
            pending_fallback,
        }
    }

    /// Next nonce the network expects from `address`
    pub async fn current_nonce(&self, address: &str) -> BroadcastResult<u64> {
        let account = self
            .transport
            .query_account(address)
            .await
            .map_err(|e| BroadcastError::Probe(e.to_string()))?;

        debug!("Network nonce for {}: {}", address, account.nonce);
        Ok(account.nonce)
    }

    /// Pending transaction count for `address`, or the fallback on failure
    pub async fn pending_count(&self, address: &str) -> u32 {
        match self.transport.query_account(address).await {
            Ok(AccountState {
                pending_count: Some(count),
                ..
            }) => count,
            Ok(_) => {
                warn!(
                    "Mempool depth unavailable for {}, assuming {}",
                    address, self.pending_fallback
                );
                self.pending_fallback
            }
            Err(e) => {
                warn!(
                    "Mempool query failed for {}: {}, assuming {}",
                    address, e, self.pending_fallback
                );
                self.pending_fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{MockTransport, TransportError};

    #[tokio::test]
    async fn test_pending_count_passthrough() {
        let mut transport = MockTransport::new();
        transport.expect_query_account().returning(|_| {
            Ok(AccountState {
                nonce: 3,
                pending_count: Some(7),
            })
        });

        let probe = ChainProbe::new(Arc::new(transport), 25);
        assert_eq!(probe.pending_count("ST1SENDER").await, 7);
        assert_eq!(probe.current_nonce("ST1SENDER").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_pending_count_falls_back_on_failure() {
        let mut transport = MockTransport::new();
        transport
            .expect_query_account()
            .times(1)
            .returning(|_| Err(TransportError::Timeout));

        let probe = ChainProbe::new(Arc::new(transport), 25);
        assert_eq!(probe.pending_count("ST1SENDER").await, 25);
    }

    #[tokio::test]
    async fn test_pending_count_falls_back_when_mempool_unreadable() {
        let mut transport = MockTransport::new();
        transport.expect_query_account().returning(|_| {
            Ok(AccountState {
                nonce: 3,
                pending_count: None,
            })
        });

        let probe = ChainProbe::new(Arc::new(transport), 30);
        assert_eq!(probe.pending_count("ST1SENDER").await, 30);
    }

    #[tokio::test]
    async fn test_nonce_failure_is_surfaced() {
        let mut transport = MockTransport::new();
        transport
            .expect_query_account()
            .returning(|_| Err(TransportError::Network("connection refused".to_string())));

        let probe = ChainProbe::new(Arc::new(transport), 25);
        let err = probe.current_nonce("ST1SENDER").await.unwrap_err();
        assert!(matches!(err, BroadcastError::Probe(msg) if msg.contains("connection refused")));
    }
}
