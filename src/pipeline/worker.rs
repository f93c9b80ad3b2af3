//! Per-item classification and the bounded worker pool that drives it.
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use super::error::ClassifyError;
use crate::classification::{ClassificationResult, UntrustedPayload, extract_object, normalize};
use crate::clients::LlmClient;
use crate::observability::metrics::Metrics;
use crate::queue::QueueItem;
use crate::schema::classification::validate_result;
use crate::store::ClassificationDao;
use crate::util::retry::{RetryPolicy, with_retry_observed};
use crate::util::text::truncate_error;

/// A failed item and the reason persisted on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub item_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ItemOutcome {
    Done(Uuid),
    Failed(ItemFailure),
    /// The claim was released and taken over while this worker ran; nothing
    /// was written.
    LostClaim(Uuid),
}

/// Classifies one claimed item and records its terminal status.
pub(crate) struct ItemProcessor {
    llm: Arc<dyn LlmClient>,
    dao: Arc<dyn ClassificationDao>,
    retry: RetryPolicy,
    metrics: Arc<Metrics>,
}

impl ItemProcessor {
    pub(crate) fn new(
        llm: Arc<dyn LlmClient>,
        dao: Arc<dyn ClassificationDao>,
        retry: RetryPolicy,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            llm,
            dao,
            retry,
            metrics,
        }
    }

    /// Runs the item to `done` or `error`; never returns an error itself.
    pub(crate) async fn handle(&self, item: QueueItem) -> ItemOutcome {
        let span = info_span!("classify_item", item_id = %item.id);
        let started = Instant::now();
        let outcome = self.process(&item).instrument(span).await;
        self.metrics
            .item_duration
            .observe(started.elapsed().as_secs_f64());

        match outcome {
            Ok(true) => {
                self.metrics.items_classified.inc();
                info!(item_id = %item.id, "item classified");
                ItemOutcome::Done(item.id)
            }
            Ok(false) => self.lost_claim(&item),
            Err(e) => {
                let reason = truncate_error(&e.to_string());
                warn!(item_id = %item.id, error = %reason, retryable = e.is_retryable(), "item failed");
                match self.dao.fail_item(&item, &reason).await {
                    Ok(false) => return self.lost_claim(&item),
                    Ok(true) => {}
                    // the item stays in processing until an operator releases it
                    Err(store_err) => {
                        error!(item_id = %item.id, error = %store_err, "failed to record item error");
                    }
                }
                self.metrics.items_failed.inc();
                ItemOutcome::Failed(ItemFailure {
                    item_id: item.id,
                    reason,
                })
            }
        }
    }

    fn lost_claim(&self, item: &QueueItem) -> ItemOutcome {
        self.metrics.items_skipped.inc();
        warn!(item_id = %item.id, "claim lost before the item was finished");
        ItemOutcome::LostClaim(item.id)
    }

    /// `Ok(false)` when the claim was lost and nothing was written.
    async fn process(&self, item: &QueueItem) -> Result<bool, ClassifyError> {
        let result = self.classify(&item.input_text).await?;

        let validation = validate_result(&result);
        if !validation.valid {
            self.metrics.validation_failures.inc();
            return Err(ClassifyError::Validation(validation.errors));
        }

        self.dao
            .complete_item(item, &result)
            .await
            .map_err(ClassifyError::Persistence)
    }

    /// Model call plus extraction under the retry policy, then normalization.
    ///
    /// # Errors
    /// The last transport or extraction failure once attempts run out.
    pub(crate) async fn classify(&self, text: &str) -> Result<ClassificationResult, ClassifyError> {
        let payload = with_retry_observed(
            &self.retry,
            |attempt| self.attempt(text, attempt),
            |_, _| self.metrics.retries_total.inc(),
        )
        .await
        .map_err(ClassifyError::from)?;

        Ok(normalize(&payload))
    }

    async fn attempt(&self, text: &str, attempt: usize) -> Result<UntrustedPayload, ClassifyError> {
        debug!(attempt = attempt + 1, "calling llm");
        let timer = self.metrics.llm_call_duration.start_timer();
        let raw = self.llm.classify(text).await;
        timer.observe_duration();

        Ok(extract_object(&raw?)?)
    }
}

/// Drains `items` with `min(concurrency, items.len())` workers pulling from
/// one shared FIFO. Completion order is unspecified.
pub(crate) async fn run_pool(
    processor: Arc<ItemProcessor>,
    items: Vec<QueueItem>,
    concurrency: usize,
    metrics: &Metrics,
) -> Vec<ItemOutcome> {
    let total = items.len();
    let workers = concurrency.max(1).min(total);
    if workers == 0 {
        return Vec::new();
    }

    let queue = Arc::new(Mutex::new(VecDeque::from(items)));
    let mut set = JoinSet::new();
    for worker_id in 0..workers {
        let queue = Arc::clone(&queue);
        let processor = Arc::clone(&processor);
        let active = metrics.active_workers.clone();
        set.spawn(async move {
            active.inc();
            let mut outcomes = Vec::new();
            loop {
                let next = queue.lock().await.pop_front();
                let Some(item) = next else {
                    break;
                };
                outcomes.push(processor.handle(item).await);
            }
            active.dec();
            debug!(worker_id, handled = outcomes.len(), "worker drained queue");
            outcomes
        });
    }

    let mut outcomes = Vec::with_capacity(total);
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(batch) => outcomes.extend(batch),
            Err(e) => error!(error = %e, "classification worker aborted"),
        }
    }
    outcomes
}
