//! Error types for the batch broadcaster

use serde::Serialize;
use thiserror::Error;

/// Main error type for the broadcaster.
///
/// Per-attempt failures never escape [`crate::batch::BatchRunner::run`] as an
/// `Err`; they end up inside the returned `BatchResult` as the abort cause.
/// Only faults detected before the first attempt are raised directly.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BroadcastError {
    #[error("Sequencing error at index {index}: nonce still conflicting after {attempts} reconciliations")]
    Sequencing { index: u32, attempts: u32 },

    #[error("Transaction {index} rejected by network: {message}")]
    PersistentRejection { index: u32, message: String },

    #[error("Transient network failure at index {index} after {attempts} attempts: {cause}")]
    TransientNetworkFailure {
        index: u32,
        attempts: u32,
        cause: String,
    },

    #[error("Rate limited by network")]
    RateLimited,

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Nonce query failed: {0}")]
    Probe(String),

    #[error("Admission wait exceeded {polls} polls at index {index}")]
    AdmissionTimeout { index: u32, polls: u32 },

    #[error("Batch cancelled before index {index}")]
    Cancelled { index: u32 },
}

impl BroadcastError {
    /// Check if error is recovered locally without caller involvement
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BroadcastError::RateLimited | BroadcastError::TransientNetworkFailure { .. }
        )
    }

    /// Precondition violations that abort without any retry
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            BroadcastError::Signing(_) | BroadcastError::Configuration(_)
        )
    }
}

/// Result type for broadcaster operations
pub type BroadcastResult<T> = Result<T, BroadcastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classes() {
        assert!(BroadcastError::RateLimited.is_retryable());
        assert!(BroadcastError::TransientNetworkFailure {
            index: 0,
            attempts: 1,
            cause: "timeout".to_string(),
        }
        .is_retryable());
        assert!(!BroadcastError::PersistentRejection {
            index: 1,
            message: "BadFunctionArgument".to_string(),
        }
        .is_retryable());
        assert!(BroadcastError::Signing("user cancelled".to_string()).is_precondition());
        assert!(!BroadcastError::Sequencing { index: 0, attempts: 3 }.is_precondition());
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let err = BroadcastError::AdmissionTimeout { index: 4, polls: 10 };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "admission_timeout");
        assert_eq!(json["polls"], 10);
    }
}
