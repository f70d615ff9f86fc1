pub(crate) mod metrics;
pub(crate) mod tracing;

use std::sync::Arc;

use anyhow::Result;
use prometheus::{Encoder, Registry, TextEncoder};

use self::metrics::Metrics;

/// Owns the process-wide metrics registry and tracing initialization.
#[derive(Debug, Clone)]
pub struct Telemetry {
    metrics: Arc<Metrics>,
}

impl Telemetry {
    /// Initializes tracing and the Prometheus registry. Idempotent.
    pub fn new() -> Result<Self> {
        tracing::init()?;
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(Metrics::new(Arc::clone(&registry))?);
        Ok(Self { metrics })
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn record_ready_probe(&self) {
        ::tracing::debug!("ready probe recorded");
    }

    pub fn record_live_probe(&self) {
        ::tracing::debug!("live probe recorded");
    }

    pub fn record_manual_generate_invocation(&self, profile_id: uuid::Uuid) {
        ::tracing::info!(%profile_id, "manual generation invoked via API");
    }

    pub fn record_admin_cancel_invocation(&self, job_id: uuid::Uuid) {
        ::tracing::warn!(%job_id, "admin job cancellation invoked");
    }

    /// Renders all registered metric families as Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        String::from_utf8(buffer).unwrap_or_default()
    }
}
