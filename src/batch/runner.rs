//! Batch runner: drives a fixed-size batch through admission, dispatch and
//! outcome resolution, one index at a time.

use super::cancel::CancelHandle;
use super::result::{BatchEntry, BatchResult, BatchStatus, SlotOutcome};
use crate::chain::{ChainProbe, Transport};
use crate::config::BroadcasterConfig;
use crate::error::{BroadcastError, BroadcastResult};
use crate::events::BatchProgress;
use crate::signer::SenderIdentity;
use crate::tx::{
    Admission, AdmissionController, AttemptOutcome, NonceSequencer, RejectReason,
    TransactionBroadcaster, TransactionSpec, TransientCause,
};

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Resolution of one batch index
enum Step {
    /// Index accepted; move on
    Done(BatchEntry),
    /// Fatal condition; `entry` holds the last outcome if one was dispatched
    Abort {
        entry: Option<BatchEntry>,
        error: BroadcastError,
    },
}

/// Per-run mutable state, private to a single `run` call
struct RunState {
    batch_id: Uuid,
    nonces: NonceSequencer,
    admission: AdmissionController,
}

/// Sequential batch submitter for a single sender.
///
/// Attempt `i + 1` is never dispatched before attempt `i` has resolved, so
/// nonces go out in ascending order. Only sequencing conflicts and rate limits
/// are recovered without the caller; everything else ends the batch and is
/// reported in the returned [`BatchResult`].
///
/// Precondition: at most one batch runs per sender identity at a time.
pub struct BatchRunner {
    /// Pacing and retry configuration
    config: BroadcasterConfig,
    /// Network queries
    probe: Arc<ChainProbe>,
    /// Single-transaction submitter
    broadcaster: TransactionBroadcaster,
    /// Progress notifications
    progress_tx: broadcast::Sender<BatchProgress>,
    /// Cancellation flag
    cancel: CancelHandle,
}

impl BatchRunner {
    /// Create a runner. Invalid configuration is rejected before any network call.
    pub fn new(config: BroadcasterConfig, transport: Arc<dyn Transport>) -> BroadcastResult<Self> {
        config.validate()?;

        let probe = Arc::new(ChainProbe::new(
            transport.clone(),
            config.pending_fallback(),
        ));
        let (progress_tx, _) = broadcast::channel(1024);

        Ok(Self {
            config,
            probe,
            broadcaster: TransactionBroadcaster::new(transport),
            progress_tx,
            cancel: CancelHandle::new(),
        })
    }

    /// Subscribe to progress notifications
    pub fn subscribe(&self) -> broadcast::Receiver<BatchProgress> {
        self.progress_tx.subscribe()
    }

    /// Handle that stops the running batch between attempts.
    ///
    /// A request made while no batch runs applies to the next `run`. Each
    /// request is consumed by the run it stops.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Submit `count` copies of `spec` from `identity`, in nonce order.
    ///
    /// Returns `Err` only when the batch cannot start (initial nonce query or
    /// configuration failure). Every later failure is reported as an
    /// `Aborted` status inside the result.
    pub async fn run(
        &self,
        spec: &TransactionSpec,
        count: u32,
        identity: &SenderIdentity,
    ) -> BroadcastResult<BatchResult> {
        let batch_id = Uuid::new_v4();
        let span = info_span!("batch", id = %batch_id, sender = identity.address());
        self.run_batch(batch_id, spec, count, identity)
            .instrument(span)
            .await
    }

    async fn run_batch(
        &self,
        batch_id: Uuid,
        spec: &TransactionSpec,
        count: u32,
        identity: &SenderIdentity,
    ) -> BroadcastResult<BatchResult> {
        let started_at = Utc::now();

        let initial = self.probe.current_nonce(identity.address()).await?;
        let mut nonces = NonceSequencer::new();
        nonces.seed(initial)?;
        crate::metrics::record_current_nonce(initial);

        let mut state = RunState {
            batch_id,
            nonces,
            admission: AdmissionController::new(
                self.probe.clone(),
                identity.address(),
                self.config.max_pending_depth,
            ),
        };

        info!(
            "Starting batch of {} x {}::{} at nonce {}",
            count,
            spec.contract_id(),
            spec.function_name,
            initial
        );
        self.notify(BatchProgress::Started {
            batch_id,
            count,
            first_nonce: initial,
        });

        let mut entries = Vec::with_capacity(count as usize);
        let mut abort = None;

        for index in 0..count {
            if self.cancel.is_cancelled().await {
                warn!("Cancellation requested, stopping before index {}", index);
                abort = Some(BroadcastError::Cancelled { index });
                break;
            }

            match self.run_index(index, spec, identity, &mut state).await {
                Step::Done(entry) => {
                    entries.push(entry);
                    if index + 1 < count {
                        sleep(self.config.inter_submission_delay()).await;
                    }
                }
                Step::Abort { entry, error } => {
                    entries.extend(entry);
                    abort = Some(error);
                    break;
                }
            }
        }

        let status = match abort {
            None => BatchStatus::Completed,
            Some(error) => {
                error!("Batch aborted: {}", error);
                BatchStatus::Aborted { error }
            }
        };

        let final_nonce = state.nonces.snapshot().map(|s| s.current);
        let result = BatchResult::seal(
            batch_id,
            identity.address(),
            count,
            entries,
            status,
            final_nonce,
            started_at,
        );

        info!(
            "Batch {}: {}/{} accepted, final nonce {:?}",
            result.status.label(),
            result.accepted_count(),
            count,
            final_nonce
        );
        // A cancellation ends this run only; the next run starts clear
        self.cancel.reset().await;

        crate::metrics::record_batch_finished(result.status.label());
        self.notify(BatchProgress::Finished {
            batch_id,
            status: result.status.clone(),
            accepted: result.accepted_count(),
        });

        Ok(result)
    }

    /// Drive one index to a terminal outcome, retrying in place as allowed
    async fn run_index(
        &self,
        index: u32,
        spec: &TransactionSpec,
        identity: &SenderIdentity,
        state: &mut RunState,
    ) -> Step {
        let mut attempts = 0;
        let mut conflicts = 0;
        let mut transient_failures = 0;

        loop {
            if let Err(error) = self.wait_for_admission(index, state).await {
                return Step::Abort { entry: None, error };
            }

            let nonce = match state.nonces.next() {
                Ok(nonce) => nonce,
                Err(error) => return Step::Abort { entry: None, error },
            };

            attempts += 1;
            let outcome = match self.broadcaster.submit(spec, nonce, identity).await {
                Ok(outcome) => outcome,
                Err(error) => return Step::Abort { entry: None, error },
            };

            self.notify(BatchProgress::Attempt {
                batch_id: state.batch_id,
                index,
                nonce,
                outcome: outcome.clone(),
            });

            let entry = BatchEntry {
                index,
                nonce: Some(nonce),
                attempts,
                sequence_conflicts: conflicts,
                outcome: SlotOutcome::Resolved(outcome.clone()),
            };

            match outcome {
                AttemptOutcome::Accepted { .. } => {
                    return match state.nonces.advance() {
                        Ok(next) => {
                            crate::metrics::record_current_nonce(next);
                            Step::Done(entry)
                        }
                        Err(error) => Step::Abort {
                            entry: Some(entry),
                            error,
                        },
                    };
                }

                AttemptOutcome::Rejected {
                    reason: RejectReason::SequenceConflict,
                } => {
                    conflicts += 1;
                    crate::metrics::record_sequence_conflict();
                    let entry = BatchEntry {
                        sequence_conflicts: conflicts,
                        ..entry
                    };

                    if conflicts > self.config.max_sequence_conflict_retries {
                        return Step::Abort {
                            entry: Some(entry),
                            error: BroadcastError::Sequencing {
                                index,
                                attempts: self.config.max_sequence_conflict_retries,
                            },
                        };
                    }

                    let reconciled = match self.probe.current_nonce(identity.address()).await {
                        Ok(authoritative) => state.nonces.reconcile(authoritative),
                        Err(error) => Err(error),
                    };
                    match reconciled {
                        Ok(next) => {
                            info!(
                                "Nonce {} conflicted, retrying index {} with {}",
                                nonce, index, next
                            );
                            crate::metrics::record_current_nonce(next);
                        }
                        Err(error) => {
                            return Step::Abort {
                                entry: Some(entry),
                                error,
                            }
                        }
                    }
                }

                AttemptOutcome::Rejected {
                    reason: RejectReason::Other(message),
                } => {
                    return Step::Abort {
                        entry: Some(entry),
                        error: BroadcastError::PersistentRejection { index, message },
                    };
                }

                AttemptOutcome::TransientFailure {
                    cause: TransientCause::RateLimited,
                } => {
                    warn!(
                        "Rate limit hit. Cooling down for {:?}",
                        self.config.rate_limit_cooldown()
                    );
                    state
                        .admission
                        .enter_cooldown(self.config.rate_limit_cooldown());
                }

                AttemptOutcome::TransientFailure {
                    cause: TransientCause::Network(cause),
                } => {
                    transient_failures += 1;
                    if transient_failures > self.config.max_transient_retries {
                        return Step::Abort {
                            entry: Some(entry),
                            error: BroadcastError::TransientNetworkFailure {
                                index,
                                attempts: transient_failures,
                                cause,
                            },
                        };
                    }

                    debug!(
                        "Transient failure {}/{} at index {}, retrying",
                        transient_failures, self.config.max_transient_retries, index
                    );
                    sleep(self.config.transient_retry_delay()).await;
                }
            }
        }
    }

    /// Block until admission control lets the next submission through
    async fn wait_for_admission(&self, index: u32, state: &mut RunState) -> BroadcastResult<()> {
        let mut polls = 0;

        loop {
            match state.admission.check().await {
                Admission::Admitted => return Ok(()),

                Admission::CoolingDown(remaining) => {
                    self.notify(BatchProgress::CoolingDown {
                        batch_id: state.batch_id,
                        index,
                        remaining_ms: remaining.as_millis() as u64,
                    });
                    sleep(remaining).await;
                }

                Admission::Congested(pending_count) => {
                    polls += 1;
                    crate::metrics::record_congestion_poll();
                    self.notify(BatchProgress::Waiting {
                        batch_id: state.batch_id,
                        index,
                        pending_count,
                        poll: polls,
                    });

                    if let Some(max_polls) = self.config.max_admission_polls {
                        if polls >= max_polls {
                            return Err(BroadcastError::AdmissionTimeout { index, polls });
                        }
                    }

                    info!(
                        "Mempool full ({}/{}). Waiting {:?} to clear",
                        pending_count,
                        state.admission.max_pending_depth(),
                        self.config.poll_interval()
                    );
                    sleep(self.config.poll_interval()).await;
                }
            }

            if self.cancel.is_cancelled().await {
                return Err(BroadcastError::Cancelled { index });
            }
        }
    }

    fn notify(&self, event: BatchProgress) {
        // No subscribers is fine
        let _ = self.progress_tx.send(event);
    }
}
