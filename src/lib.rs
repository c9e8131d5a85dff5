//! STX Batch Broadcaster - ordered, nonce-sequenced batch submission
//!
//! Submits a batch of identical contract calls from one sender, keeping nonces
//! strictly sequential while respecting mempool depth limits and API rate limits.

pub mod api;
pub mod batch;
pub mod chain;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod signer;
pub mod tx;

pub use batch::{BatchResult, BatchRunner, BatchStatus, CancelHandle};
pub use chain::{ChainProbe, HiroTransport, Transport};
pub use config::{BroadcasterConfig, Settings};
pub use error::{BroadcastError, BroadcastResult};
pub use events::BatchProgress;
pub use signer::{SenderIdentity, Signer};
pub use tx::TransactionSpec;
