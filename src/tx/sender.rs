//! Single transaction submission and outcome classification

use super::outcome::{AttemptOutcome, RejectReason, TransientCause};
use super::template::TransactionSpec;
use crate::chain::{SubmitResponse, Transport, TransportError};
use crate::error::{BroadcastError, BroadcastResult};
use crate::signer::SenderIdentity;

use std::sync::Arc;
use tracing::{debug, info, warn};

/// Rejection codes that mean the nonce is out of step with the network
const SEQUENCE_CONFLICT_CODES: &[&str] = &["BadNonce", "ConflictingNonceInMempool", "NonceAlreadyUsed"];

/// Builds, signs and submits one transaction. Stateless across calls.
pub struct TransactionBroadcaster {
    transport: Arc<dyn Transport>,
}

impl TransactionBroadcaster {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Sign `spec` at `nonce` and submit it.
    ///
    /// Network outcomes are always returned as an [`AttemptOutcome`]; only a
    /// signing failure is an error, since nothing reached the network.
    pub async fn submit(
        &self,
        spec: &TransactionSpec,
        nonce: u64,
        identity: &SenderIdentity,
    ) -> BroadcastResult<AttemptOutcome> {
        let signed_tx = identity
            .sign(spec, nonce)
            .await
            .map_err(|e| BroadcastError::Signing(e.to_string()))?;

        debug!(
            "Submitting {}::{} with nonce {} ({} bytes)",
            spec.contract_id(),
            spec.function_name,
            nonce,
            signed_tx.len()
        );

        let outcome = classify(self.transport.submit_raw(signed_tx).await);
        match &outcome {
            AttemptOutcome::Accepted { tx_id } => {
                info!("Transaction sent: {} (nonce {})", tx_id, nonce);
            }
            AttemptOutcome::Rejected { reason } => {
                warn!("Transaction with nonce {} rejected: {}", nonce, reason);
            }
            AttemptOutcome::TransientFailure { cause } => {
                warn!("Transaction with nonce {} not delivered: {}", nonce, cause);
            }
        }

        crate::metrics::record_submission(outcome.label());
        Ok(outcome)
    }
}

/// Map a transport result onto an attempt outcome
fn classify(result: Result<SubmitResponse, TransportError>) -> AttemptOutcome {
    let response = match result {
        Ok(response) => response,
        Err(TransportError::RateLimited) => {
            return AttemptOutcome::TransientFailure {
                cause: TransientCause::RateLimited,
            }
        }
        Err(e) => {
            return AttemptOutcome::TransientFailure {
                cause: TransientCause::Network(e.to_string()),
            }
        }
    };

    if response.accepted {
        return match response.tx_id {
            Some(tx_id) if !tx_id.is_empty() => AttemptOutcome::Accepted { tx_id },
            _ => AttemptOutcome::TransientFailure {
                cause: TransientCause::Network("acceptance without transaction id".to_string()),
            },
        };
    }

    if is_sequence_conflict(&response) {
        return AttemptOutcome::Rejected {
            reason: RejectReason::SequenceConflict,
        };
    }

    let message = match (response.error_code, response.error_message) {
        (Some(code), Some(message)) => format!("{}: {}", code, message),
        (Some(code), None) => code,
        (None, Some(message)) => message,
        (None, None) => "rejected without reason".to_string(),
    };

    AttemptOutcome::Rejected {
        reason: RejectReason::Other(message),
    }
}

fn is_sequence_conflict(response: &SubmitResponse) -> bool {
    let code_matches = response
        .error_code
        .as_deref()
        .map(|code| SEQUENCE_CONFLICT_CODES.contains(&code))
        .unwrap_or(false);

    let message_matches = response
        .error_message
        .as_deref()
        .map(|m| m.to_lowercase().contains("nonce too low"))
        .unwrap_or(false);

    code_matches || message_matches
}
