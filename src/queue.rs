//! Work queue of transcripts awaiting classification.
mod claim;
mod types;

pub use claim::{ClaimManager, ClaimOutcome};
pub use types::{ItemStatus, QueueItem};
