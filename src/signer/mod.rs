//! Signing capability for the batch sender
//!
//! Transaction serialization and key handling live outside this crate. The
//! broadcaster only asks a [`Signer`] for the signed bytes of one call.

mod remote;

pub use remote::RemoteSigner;

use crate::tx::TransactionSpec;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    /// The identity declined to sign (e.g. cancelled in an interactive wallet)
    #[error("signature refused: {0}")]
    Refused(String),

    #[error("signer unavailable: {0}")]
    Unavailable(String),

    #[error("invalid signed payload: {0}")]
    InvalidPayload(String),
}

/// Produces signed transaction bytes for a template and nonce
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, spec: &TransactionSpec, nonce: u64) -> Result<Vec<u8>, SigningError>;
}

/// Signing capability plus the sender address it signs for.
///
/// Immutable for the run. Running two batches for the same identity at once
/// is unsupported; callers must serialize them.
#[derive(Clone)]
pub struct SenderIdentity {
    address: String,
    signer: Arc<dyn Signer>,
}

impl SenderIdentity {
    pub fn new(address: impl Into<String>, signer: Arc<dyn Signer>) -> Self {
        Self {
            address: address.into(),
            signer,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn sign(&self, spec: &TransactionSpec, nonce: u64) -> Result<Vec<u8>, SigningError> {
        self.signer.sign(spec, nonce).await
    }
}

impl fmt::Debug for SenderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenderIdentity")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
