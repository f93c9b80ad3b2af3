use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ledger::{RunLedger, RunSummary};
use super::worker::{ItemFailure, ItemOutcome, ItemProcessor, run_pool};
use crate::clients::LlmClient;
use crate::observability::metrics::Metrics;
use crate::queue::ClaimManager;
use crate::store::ClassificationDao;
use crate::util::retry::RetryPolicy;

/// Knobs of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub concurrency: usize,
    pub default_limit: usize,
    pub max_limit: usize,
    pub retry: RetryPolicy,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            concurrency: 3,
            default_limit: 10,
            max_limit: 100,
            retry: RetryPolicy::default(),
        }
    }
}

/// Aggregate of one batch run.
///
/// `skipped_count` covers items lost to a concurrent claim, both at claim
/// time and while processing; they are not part of `processed_count`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub processed_count: usize,
    pub ok_count: usize,
    pub error_count: usize,
    pub skipped_count: usize,
    pub failures: Vec<ItemFailure>,
    pub concurrency: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub pending: u64,
    pub processing: u64,
    pub done: u64,
    pub error: u64,
    pub total_items: u64,
    pub total_results: u64,
    pub last_run: Option<RunSummary>,
}

/// Runs batches and answers status queries over the same ledger.
pub struct RunCoordinator {
    dao: Arc<dyn ClassificationDao>,
    claims: ClaimManager,
    processor: Arc<ItemProcessor>,
    settings: CoordinatorSettings,
    ledger: Arc<RunLedger>,
    metrics: Arc<Metrics>,
}

impl RunCoordinator {
    #[must_use]
    pub fn new(
        dao: Arc<dyn ClassificationDao>,
        llm: Arc<dyn LlmClient>,
        settings: CoordinatorSettings,
        metrics: Arc<Metrics>,
    ) -> Self {
        let processor = Arc::new(ItemProcessor::new(
            llm,
            Arc::clone(&dao),
            settings.retry,
            Arc::clone(&metrics),
        ));
        Self {
            claims: ClaimManager::new(Arc::clone(&dao)),
            dao,
            processor,
            settings,
            ledger: Arc::new(RunLedger::new()),
            metrics,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Missing limits use the default; explicit ones are clamped to `1..=max_limit`.
    #[must_use]
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        let max = self.settings.max_limit.max(1);
        requested
            .unwrap_or(self.settings.default_limit)
            .clamp(1, max)
    }

    /// Claims up to `limit` pending items and classifies them.
    ///
    /// Per-item failures are reported in the outcome, never as an error.
    ///
    /// # Errors
    /// Only when the claim itself fails.
    #[allow(clippy::cast_precision_loss)]
    pub async fn run_batch(&self, limit: Option<usize>) -> Result<BatchOutcome> {
        let started = Instant::now();
        let limit = self.clamp_limit(limit);
        self.metrics.batches_total.inc();

        let claim = self.claims.claim(limit).await.context("batch claim failed")?;
        let claimed = claim.items.len();
        self.metrics.items_claimed.inc_by(claimed as f64);
        self.metrics.items_skipped.inc_by(claim.skipped as f64);
        self.metrics.last_batch_size.set(claimed as f64);

        let outcomes = run_pool(
            Arc::clone(&self.processor),
            claim.items,
            self.settings.concurrency,
            &self.metrics,
        )
        .await;

        let mut outcome = BatchOutcome {
            skipped_count: claim.skipped,
            concurrency: self.settings.concurrency,
            ..BatchOutcome::default()
        };
        for item in outcomes {
            match item {
                ItemOutcome::Done(_) => outcome.ok_count += 1,
                ItemOutcome::Failed(failure) => {
                    outcome.error_count += 1;
                    outcome.failures.push(failure);
                }
                ItemOutcome::LostClaim(_) => outcome.skipped_count += 1,
            }
        }
        outcome.processed_count = outcome.ok_count + outcome.error_count;

        let elapsed = started.elapsed();
        outcome.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.metrics.batch_duration.observe(elapsed.as_secs_f64());
        self.ledger
            .record(RunSummary::new(
                outcome.processed_count,
                outcome.duration_ms,
                Utc::now(),
            ))
            .await;

        info!(
            limit,
            processed = outcome.processed_count,
            ok = outcome.ok_count,
            errors = outcome.error_count,
            skipped = outcome.skipped_count,
            duration_ms = outcome.duration_ms,
            "batch finished"
        );

        Ok(outcome)
    }

    /// # Errors
    /// Propagates storage failures.
    pub async fn status(&self) -> Result<StatusReport> {
        let counts = self
            .dao
            .status_counts()
            .await
            .context("failed to count items")?;
        let total_results = self
            .dao
            .count_results()
            .await
            .context("failed to count results")?;

        Ok(StatusReport {
            pending: counts.pending,
            processing: counts.processing,
            done: counts.done,
            error: counts.error,
            total_items: counts.total(),
            total_results,
            last_run: self.ledger.last_run().await,
        })
    }
}
