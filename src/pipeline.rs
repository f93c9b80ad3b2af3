//! Batch execution: claim, fan out to workers, aggregate.
mod coordinator;
mod error;
mod ledger;
mod worker;

pub use coordinator::{BatchOutcome, CoordinatorSettings, RunCoordinator, StatusReport};
pub use error::ClassifyError;
pub use ledger::RunSummary;
pub use worker::ItemFailure;
