//! Nonce sequencing for a single sender
//!
//! Owns the authoritative next-nonce value for one batch run:
//! - seeded once from the network before the first submission
//! - advanced locally after every accepted transaction
//! - re-fetched from the network only after a sequencing conflict

use crate::error::{BroadcastError, BroadcastResult};

use tokio::time::Instant;
use tracing::{debug, warn};

/// Local view of the sender's sequencing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceState {
    /// Next nonce to use
    pub current: u64,
    /// When `current` was last taken from the network
    pub last_refreshed_at: Instant,
}

/// Single-writer nonce tracker.
///
/// Assumes serialized access: at most one nonce is handed out and unresolved
/// at any time. `current` never decreases over the lifetime of the sequencer.
#[derive(Debug, Default)]
pub struct NonceSequencer {
    state: Option<NonceState>,
}

impl NonceSequencer {
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Seed from the network's value. Only valid once.
    pub fn seed(&mut self, initial: u64) -> BroadcastResult<()> {
        if let Some(state) = self.state {
            return Err(BroadcastError::Configuration(format!(
                "nonce sequencer already seeded at {}",
                state.current
            )));
        }

        self.state = Some(NonceState {
            current: initial,
            last_refreshed_at: Instant::now(),
        });
        debug!("Seeded nonce sequencer at {}", initial);
        Ok(())
    }

    /// Nonce for the next attempt. Does not mutate state.
    pub fn next(&self) -> BroadcastResult<u64> {
        self.state().map(|s| s.current)
    }

    /// Move past the nonce just accepted by the network
    pub fn advance(&mut self) -> BroadcastResult<u64> {
        let state = self.state_mut()?;
        state.current += 1;
        Ok(state.current)
    }

    /// Adopt the network's view after a sequencing conflict.
    ///
    /// A value behind the local one is ignored: the local nonce already
    /// accounts for transactions the network has accepted but not yet counted.
    pub fn reconcile(&mut self, authoritative: u64) -> BroadcastResult<u64> {
        let state = self.state_mut()?;
        state.last_refreshed_at = Instant::now();

        if authoritative < state.current {
            warn!(
                "Network nonce {} is behind local nonce {}, keeping local value",
                authoritative, state.current
            );
        } else {
            if authoritative > state.current {
                warn!(
                    "Nonce gap detected: local {}, network {}",
                    state.current, authoritative
                );
            }
            state.current = authoritative;
        }

        Ok(state.current)
    }

    /// Current state, if seeded
    pub fn snapshot(&self) -> Option<NonceState> {
        self.state
    }

    fn state(&self) -> BroadcastResult<&NonceState> {
        self.state.as_ref().ok_or_else(not_seeded)
    }

    fn state_mut(&mut self) -> BroadcastResult<&mut NonceState> {
        self.state.as_mut().ok_or_else(not_seeded)
    }
}

fn not_seeded() -> BroadcastError {
    BroadcastError::Configuration("nonce sequencer used before seeding".to_string())
}
