//! Cooperative cancellation between batch attempts

use std::sync::Arc;
use tokio::sync::RwLock;

/// Cloneable handle used to stop a running batch.
///
/// Honored at the top of each index and between admission polls. A submission
/// already in flight always completes and is recorded first.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<RwLock<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn cancel(&self) {
        *self.cancelled.write().await = true;
    }

    pub async fn is_cancelled(&self) -> bool {
        *self.cancelled.read().await
    }

    /// Clear a request once the run it targeted has finished
    pub(crate) async fn reset(&self) {
        *self.cancelled.write().await = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_state() {
        let handle = CancelHandle::new();
        let other = handle.clone();
        assert!(!other.is_cancelled().await);
        handle.cancel().await;
        assert!(other.is_cancelled().await);

        other.reset().await;
        assert!(!handle.is_cancelled().await);
    }
}
