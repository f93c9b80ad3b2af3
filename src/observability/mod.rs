pub mod metrics;
pub mod tracing;

use std::sync::Arc;

use anyhow::Result;
use prometheus::{Encoder, Registry, TextEncoder};

use self::metrics::Metrics;
use self::tracing::TracingSettings;

/// Owns the process metrics registry and the tracing subscriber.
#[derive(Debug, Clone)]
pub struct Telemetry {
    registry: Arc<Registry>,
    metrics: Arc<Metrics>,
}

impl Telemetry {
    /// Installs the global subscriber (once) and registers every metric.
    ///
    /// # Errors
    /// Fails when the subscriber or a metric cannot be registered.
    pub fn new(tracing_settings: &TracingSettings) -> Result<Self> {
        tracing::init(tracing_settings)?;
        Self::metrics_only()
    }

    /// Registers metrics without touching the global subscriber.
    ///
    /// # Errors
    /// Fails when a metric cannot be registered.
    pub fn metrics_only() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(Metrics::new(&registry)?);
        Ok(Self { registry, metrics })
    }

    #[must_use]
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    pub(crate) fn record_ready_probe(&self) {
        ::tracing::debug!("ready probe");
    }

    pub(crate) fn record_admin_invocation(&self, operation: &'static str) {
        ::tracing::warn!(operation, "admin operation invoked");
    }

    /// Text exposition of this process' registry.
    #[must_use]
    pub(crate) fn render_prometheus(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            ::tracing::warn!(error = %e, "failed to encode prometheus metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
