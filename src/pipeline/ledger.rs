use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Statistics of the most recent batch that processed at least one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub processed: usize,
    pub duration_ms: u64,
    pub avg_duration_ms_per_item: u64,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    #[must_use]
    pub fn new(processed: usize, duration_ms: u64, finished_at: DateTime<Utc>) -> Self {
        let divisor = u64::try_from(processed.max(1)).unwrap_or(u64::MAX);
        Self {
            processed,
            duration_ms,
            avg_duration_ms_per_item: duration_ms / divisor,
            finished_at,
        }
    }
}

/// Process-local record of the last batch; lost on restart.
#[derive(Debug, Default)]
pub(crate) struct RunLedger {
    last: RwLock<Option<RunSummary>>,
}

impl RunLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores `summary` unless it processed nothing.
    pub(crate) async fn record(&self, summary: RunSummary) {
        if summary.processed == 0 {
            return;
        }
        *self.last.write().await = Some(summary);
    }

    pub(crate) async fn last_run(&self) -> Option<RunSummary> {
        *self.last.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_runs_do_not_replace_the_last_summary() {
        let ledger = RunLedger::new();
        assert_eq!(ledger.last_run().await, None);

        let summary = RunSummary::new(4, 1_000, Utc::now());
        ledger.record(summary).await;
        ledger.record(RunSummary::new(0, 5, Utc::now())).await;

        assert_eq!(ledger.last_run().await, Some(summary));
    }

    #[test]
    fn average_is_per_item() {
        let summary = RunSummary::new(4, 1_000, Utc::now());
        assert_eq!(summary.avg_duration_ms_per_item, 250);
    }
}
