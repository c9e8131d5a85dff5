//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Submission outcomes
//! - Sequencing conflicts and rate-limit cooldowns
//! - Mempool congestion
//! - Batch completion

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_int_counter, register_int_gauge, CounterVec, Encoder,
    IntCounter, IntGauge, TextEncoder,
};
use tracing::warn;

lazy_static! {
    pub static ref SUBMISSIONS: CounterVec = register_counter_vec!(
        "broadcaster_submissions_total",
        "Submission attempts by classified outcome",
        &["outcome"]
    ).unwrap();

    pub static ref SEQUENCE_CONFLICTS: IntCounter = register_int_counter!(
        "broadcaster_sequence_conflicts_total",
        "Nonce conflicts that triggered reconciliation"
    ).unwrap();

    pub static ref COOLDOWNS: IntCounter = register_int_counter!(
        "broadcaster_cooldowns_total",
        "Rate-limit cooldowns entered"
    ).unwrap();

    pub static ref CONGESTION_POLLS: IntCounter = register_int_counter!(
        "broadcaster_congestion_polls_total",
        "Admission polls refused because the mempool was full"
    ).unwrap();

    pub static ref BATCHES: CounterVec = register_counter_vec!(
        "broadcaster_batches_total",
        "Batches finished by terminal status",
        &["status"]
    ).unwrap();

    pub static ref CURRENT_NONCE: IntGauge = register_int_gauge!(
        "broadcaster_current_nonce",
        "Next nonce held by the sequencer"
    ).unwrap();

    pub static ref PENDING_DEPTH: IntGauge = register_int_gauge!(
        "broadcaster_pending_depth",
        "Last observed pending transaction count"
    ).unwrap();
}

/// Render all registered metrics in the text exposition format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

// Helper functions to record metrics

pub fn record_submission(outcome: &str) {
    SUBMISSIONS.with_label_values(&[outcome]).inc();
}

pub fn record_sequence_conflict() {
    SEQUENCE_CONFLICTS.inc();
}

pub fn record_cooldown() {
    COOLDOWNS.inc();
}

pub fn record_congestion_poll() {
    CONGESTION_POLLS.inc();
}

pub fn record_batch_finished(status: &str) {
    BATCHES.with_label_values(&[status]).inc();
}

pub fn record_current_nonce(nonce: u64) {
    CURRENT_NONCE.set(gauge_value(nonce));
}

/// Integer gauge value for a nonce, saturating at `i64::MAX`
fn gauge_value(nonce: u64) -> i64 {
    i64::try_from(nonce).unwrap_or(i64::MAX)
}

pub fn record_pending_depth(pending: u32) {
    PENDING_DEPTH.set(i64::from(pending));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_series() {
        record_submission("accepted");
        record_pending_depth(4);
        let text = render();
        assert!(text.contains("broadcaster_submissions_total"));
        assert!(text.contains("broadcaster_pending_depth"));
    }

    #[test]
    fn test_nonce_gauge_keeps_large_values_exact() {
        let nonce = (1u64 << 53) + 1;
        assert_eq!(gauge_value(nonce), 9_007_199_254_740_993);
        assert_eq!(gauge_value(u64::MAX), i64::MAX);
    }
}
