//! Batch progress notifications
//!
//! Delivered fire-and-forget over a broadcast channel for UI consumption.
//! Slow or absent subscribers never hold up the batch.

use crate::batch::BatchStatus;
use crate::tx::AttemptOutcome;

use serde::Serialize;
use uuid::Uuid;

/// Progress event emitted by a running batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchProgress {
    /// Batch seeded and about to submit
    Started {
        batch_id: Uuid,
        count: u32,
        first_nonce: u64,
    },

    /// Mempool at capacity, waiting for it to drain
    Waiting {
        batch_id: Uuid,
        index: u32,
        pending_count: u32,
        poll: u32,
    },

    /// Rate-limit cooldown in force
    CoolingDown {
        batch_id: Uuid,
        index: u32,
        remaining_ms: u64,
    },

    /// One submission attempt resolved
    Attempt {
        batch_id: Uuid,
        index: u32,
        nonce: u64,
        outcome: AttemptOutcome,
    },

    /// Batch reached a terminal state
    Finished {
        batch_id: Uuid,
        status: BatchStatus,
        accepted: u32,
    },
}

impl BatchProgress {
    pub fn batch_id(&self) -> Uuid {
        match self {
            BatchProgress::Started { batch_id, .. } => *batch_id,
            BatchProgress::Waiting { batch_id, .. } => *batch_id,
            BatchProgress::CoolingDown { batch_id, .. } => *batch_id,
            BatchProgress::Attempt { batch_id, .. } => *batch_id,
            BatchProgress::Finished { batch_id, .. } => *batch_id,
        }
    }

    /// Index the event refers to, if any
    pub fn index(&self) -> Option<u32> {
        match self {
            BatchProgress::Waiting { index, .. }
            | BatchProgress::CoolingDown { index, .. }
            | BatchProgress::Attempt { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Get event name for logs
    pub fn name(&self) -> &'static str {
        match self {
            BatchProgress::Started { .. } => "started",
            BatchProgress::Waiting { .. } => "waiting",
            BatchProgress::CoolingDown { .. } => "cooling_down",
            BatchProgress::Attempt { .. } => "attempt",
            BatchProgress::Finished { .. } => "finished",
        }
    }
}
