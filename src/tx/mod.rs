//! Transaction submission module with nonce sequencing and admission control

mod admission;
mod nonce;
mod outcome;
mod sender;
mod template;

pub use admission::{Admission, AdmissionController, AdmissionSnapshot};
pub use nonce::{NonceSequencer, NonceState};
pub use outcome::{AttemptOutcome, RejectReason, TransientCause};
pub use sender::TransactionBroadcaster;
pub use template::{ArgValue, TransactionSpec};
