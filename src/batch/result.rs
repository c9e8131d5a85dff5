//! Batch result artifact returned to the caller

use crate::error::BroadcastError;
use crate::tx::AttemptOutcome;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Terminal state of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchStatus {
    /// Every requested index was accepted
    Completed,
    /// A fatal condition stopped the batch early
    Aborted { error: BroadcastError },
}

impl BatchStatus {
    pub fn label(&self) -> &'static str {
        match self {
            BatchStatus::Completed => "completed",
            BatchStatus::Aborted { .. } => "aborted",
        }
    }
}

/// What happened at one batch index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotOutcome {
    /// Final attempt outcome for this index
    Resolved(AttemptOutcome),
    /// Never attempted because the batch aborted first
    Skipped,
}

/// Record for one requested transaction index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchEntry {
    pub index: u32,
    /// Nonce of the final attempt, if one was dispatched
    pub nonce: Option<u64>,
    /// Submission attempts made for this index, including retries
    pub attempts: u32,
    pub sequence_conflicts: u32,
    pub outcome: SlotOutcome,
}

impl BatchEntry {
    pub fn skipped(index: u32) -> Self {
        Self {
            index,
            nonce: None,
            attempts: 0,
            sequence_conflicts: 0,
            outcome: SlotOutcome::Skipped,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(&self.outcome, SlotOutcome::Resolved(o) if o.is_accepted())
    }
}

/// Sole artifact of a batch run: one entry per requested index, in order
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub batch_id: Uuid,
    pub sender: String,
    pub requested: u32,
    pub entries: Vec<BatchEntry>,
    pub status: BatchStatus,
    /// Sequencer's next nonce when the batch ended
    pub final_nonce: Option<u64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchResult {
    /// Seal a batch, marking every index without an entry as skipped
    pub(crate) fn seal(
        batch_id: Uuid,
        sender: &str,
        requested: u32,
        mut entries: Vec<BatchEntry>,
        status: BatchStatus,
        final_nonce: Option<u64>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let recorded = entries.len() as u32;
        entries.extend((recorded..requested).map(BatchEntry::skipped));

        Self {
            batch_id,
            sender: sender.to_string(),
            requested,
            entries,
            status,
            final_nonce,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == BatchStatus::Completed
    }

    /// Fatal condition that stopped the batch, if it did not complete
    pub fn abort_error(&self) -> Option<&BroadcastError> {
        match &self.status {
            BatchStatus::Completed => None,
            BatchStatus::Aborted { error } => Some(error),
        }
    }

    pub fn accepted_count(&self) -> u32 {
        self.entries.iter().filter(|e| e.is_accepted()).count() as u32
    }

    pub fn skipped_count(&self) -> u32 {
        self.entries
            .iter()
            .filter(|e| e.outcome == SlotOutcome::Skipped)
            .count() as u32
    }

    /// Nonces of accepted transactions, in index order
    pub fn accepted_nonces(&self) -> Vec<u64> {
        self.entries
            .iter()
            .filter(|e| e.is_accepted())
            .filter_map(|e| e.nonce)
            .collect()
    }
}
