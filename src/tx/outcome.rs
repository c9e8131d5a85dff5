//! Classified result of a single submission attempt

use serde::Serialize;

/// Outcome of one submission. Consumed by the batch runner, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Network accepted the transaction into its mempool
    Accepted { tx_id: String },
    /// Network explicitly refused the transaction
    Rejected { reason: RejectReason },
    /// The transport call itself failed; the transaction's fate is unknown
    TransientFailure { cause: TransientCause },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum RejectReason {
    /// Nonce already used or otherwise out of sequence
    SequenceConflict,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum TransientCause {
    RateLimited,
    Network(String),
}

impl AttemptOutcome {
    /// Short label used for metrics and progress events
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Accepted { .. } => "accepted",
            AttemptOutcome::Rejected {
                reason: RejectReason::SequenceConflict,
            } => "sequence_conflict",
            AttemptOutcome::Rejected { .. } => "rejected",
            AttemptOutcome::TransientFailure {
                cause: TransientCause::RateLimited,
            } => "rate_limited",
            AttemptOutcome::TransientFailure { .. } => "transient_failure",
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, AttemptOutcome::Accepted { .. })
    }

    pub fn tx_id(&self) -> Option<&str> {
        match self {
            AttemptOutcome::Accepted { tx_id } => Some(tx_id),
            _ => None,
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::SequenceConflict => write!(f, "sequence conflict"),
            RejectReason::Other(message) => write!(f, "{}", message),
        }
    }
}

impl std::fmt::Display for TransientCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransientCause::RateLimited => write!(f, "rate limited"),
            TransientCause::Network(message) => write!(f, "{}", message),
        }
    }
}
