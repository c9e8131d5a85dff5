//! Batch orchestration: ordered, single-sender submission of a fixed-size batch

mod cancel;
mod result;
mod runner;

pub use cancel::CancelHandle;
pub use result::{BatchEntry, BatchResult, BatchStatus, SlotOutcome};
pub use runner::BatchRunner;
