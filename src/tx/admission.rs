//! Admission control based on mempool depth and rate-limit cooldowns

use crate::chain::ChainProbe;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Pending depth observed before one admission decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionSnapshot {
    pub pending_count: u32,
    pub observed_at: Instant,
}

/// Outcome of one admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Rate-limit cooldown still running; no query was made
    CoolingDown(Duration),
    /// Pending depth observed at or above the threshold
    Congested(u32),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

/// Decides whether the network can take another submission right now.
///
/// Polling backpressure: the network has no push notification for mempool
/// drain, so callers re-ask after a poll interval when refused.
pub struct AdmissionController {
    probe: Arc<ChainProbe>,
    address: String,
    max_pending_depth: u32,
    cooldown_until: Option<Instant>,
    last_snapshot: Option<AdmissionSnapshot>,
}

impl AdmissionController {
    pub fn new(probe: Arc<ChainProbe>, address: impl Into<String>, max_pending_depth: u32) -> Self {
        Self {
            probe,
            address: address.into(),
            max_pending_depth,
            cooldown_until: None,
            last_snapshot: None,
        }
    }

    /// True iff no cooldown is active and pending depth is below the threshold.
    pub async fn may_proceed(&mut self) -> bool {
        self.check().await.is_admitted()
    }

    /// Admission decision together with the reason for a refusal.
    ///
    /// Queries the network unless a cooldown is active; a previous snapshot
    /// is never reused.
    pub async fn check(&mut self) -> Admission {
        if let Some(remaining) = self.cooldown_remaining() {
            return Admission::CoolingDown(remaining);
        }
        self.cooldown_until = None;

        let pending_count = self.probe.pending_count(&self.address).await;
        self.last_snapshot = Some(AdmissionSnapshot {
            pending_count,
            observed_at: Instant::now(),
        });
        crate::metrics::record_pending_depth(pending_count);

        if pending_count < self.max_pending_depth {
            return Admission::Admitted;
        }
        debug!(
            "Mempool full for {} ({}/{})",
            self.address, pending_count, self.max_pending_depth
        );
        Admission::Congested(pending_count)
    }

    /// Refuse all submissions for `duration` from now
    pub fn enter_cooldown(&mut self, duration: Duration) {
        let until = Instant::now() + duration;
        // Overlapping cooldowns keep the later deadline
        self.cooldown_until = Some(match self.cooldown_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });
        crate::metrics::record_cooldown();
    }

    /// Time left in the active cooldown, if any
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let until = self.cooldown_until?;
        let now = Instant::now();
        (now < until).then(|| until - now)
    }

    pub fn last_snapshot(&self) -> Option<AdmissionSnapshot> {
        self.last_snapshot
    }

    pub fn max_pending_depth(&self) -> u32 {
        self.max_pending_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{AccountState, MockTransport};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn controller_with_depths(depths: Vec<u32>, threshold: u32) -> (AdmissionController, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut transport = MockTransport::new();
        transport.expect_query_account().returning(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let depth = depths[n.min(depths.len() - 1)];
            Ok(AccountState {
                nonce: 0,
                pending_count: Some(depth),
            })
        });

        let probe = Arc::new(ChainProbe::new(Arc::new(transport), 25));
        (AdmissionController::new(probe, "ST1SENDER", threshold), calls)
    }

    #[tokio::test]
    async fn test_threshold_is_exclusive() {
        let (mut admission, _) = controller_with_depths(vec![19, 20, 21, 0], 20);
        assert!(admission.may_proceed().await);
        assert!(!admission.may_proceed().await);
        assert!(!admission.may_proceed().await);
        assert!(admission.may_proceed().await);
    }

    #[tokio::test]
    async fn test_requeries_before_every_decision() {
        let (mut admission, calls) = controller_with_depths(vec![0], 20);
        for _ in 0..3 {
            assert!(admission.may_proceed().await);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(admission.last_snapshot().unwrap().pending_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_blocks_without_querying() {
        let (mut admission, calls) = controller_with_depths(vec![0], 20);
        admission.enter_cooldown(Duration::from_secs(60));

        assert!(!admission.may_proceed().await);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!admission.may_proceed().await);
        assert!(admission.cooldown_remaining().unwrap() <= Duration::from_secs(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(admission.cooldown_remaining().is_none());
        assert!(admission.may_proceed().await);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_reports_refusal_reason() {
        let (mut admission, calls) = controller_with_depths(vec![23, 4], 20);

        assert_eq!(admission.check().await, Admission::Congested(23));
        assert_eq!(admission.check().await, Admission::Admitted);

        admission.enter_cooldown(Duration::from_secs(10));
        assert_eq!(
            admission.check().await,
            Admission::CoolingDown(Duration::from_secs(10))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shorter_cooldown_does_not_shorten_active_one() {
        let (mut admission, _) = controller_with_depths(vec![0], 20);
        admission.enter_cooldown(Duration::from_secs(60));
        admission.enter_cooldown(Duration::from_secs(5));
        assert!(admission.cooldown_remaining().unwrap() > Duration::from_secs(55));
    }
}
