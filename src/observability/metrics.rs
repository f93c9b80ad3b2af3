use prometheus::{
    Counter, Gauge, Histogram, Registry, histogram_opts, register_counter_with_registry,
    register_gauge_with_registry, register_histogram_with_registry,
};

/// Batch pipeline metrics.
#[derive(Debug, Clone)]
pub struct Metrics {
    pub items_claimed: Counter,
    pub items_classified: Counter,
    pub items_failed: Counter,
    pub items_skipped: Counter,
    pub retries_total: Counter,
    pub validation_failures: Counter,
    pub batches_total: Counter,

    pub llm_call_duration: Histogram,
    pub item_duration: Histogram,
    pub batch_duration: Histogram,

    pub last_batch_size: Gauge,
    pub active_workers: Gauge,
}

impl Metrics {
    /// # Errors
    /// Fails when a metric name is already registered in `registry`.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            items_claimed: register_counter_with_registry!(
                "classify_items_claimed_total",
                "Queue items moved from pending to processing",
                registry
            )?,
            items_classified: register_counter_with_registry!(
                "classify_items_classified_total",
                "Queue items classified and persisted",
                registry
            )?,
            items_failed: register_counter_with_registry!(
                "classify_items_failed_total",
                "Queue items that ended in the error status",
                registry
            )?,
            items_skipped: register_counter_with_registry!(
                "classify_items_skipped_total",
                "Selected items lost to a concurrent claim",
                registry
            )?,
            retries_total: register_counter_with_registry!(
                "classify_retries_total",
                "LLM attempts retried after a failure",
                registry
            )?,
            validation_failures: register_counter_with_registry!(
                "classify_validation_failures_total",
                "Normalized results rejected by the result schema",
                registry
            )?,
            batches_total: register_counter_with_registry!(
                "classify_batches_total",
                "Batch runs started",
                registry
            )?,
            llm_call_duration: register_histogram_with_registry!(
                histogram_opts!(
                    "classify_llm_call_duration_seconds",
                    "Latency of one LLM attempt including extraction",
                    vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0]
                ),
                registry
            )?,
            item_duration: register_histogram_with_registry!(
                histogram_opts!(
                    "classify_item_duration_seconds",
                    "End-to-end processing time of one item",
                    vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
                ),
                registry
            )?,
            batch_duration: register_histogram_with_registry!(
                histogram_opts!(
                    "classify_batch_duration_seconds",
                    "Wall-clock duration of one batch run",
                    vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]
                ),
                registry
            )?,
            last_batch_size: register_gauge_with_registry!(
                "classify_last_batch_size",
                "Items claimed by the most recent batch",
                registry
            )?,
            active_workers: register_gauge_with_registry!(
                "classify_active_workers",
                "Workers currently draining the batch queue",
                registry
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = Registry::new();
        Metrics::new(&registry).expect("first registration");
        assert!(Metrics::new(&registry).is_err());
    }
}
