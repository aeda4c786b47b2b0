//! Single-gauge registry backing one scrape target.

use prometheus::core::Collector;
use prometheus::{Encoder, Gauge, Opts, Registry, TextEncoder};

use crate::error::{Error, Result};

/// Content type of the Prometheus text exposition format.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// An isolated registry holding exactly one gauge.
///
/// Clones share the same underlying registry and gauge, so the update loop
/// and the HTTP handler can each hold one.
#[derive(Clone)]
pub struct TargetRegistry {
    registry: Registry,
    gauge: Gauge,
}

impl TargetRegistry {
    /// Create a registry with a gauge named `metric_name`.
    ///
    /// The gauge's help text is `Metric for <metric_name>`.
    pub fn new(metric_name: &str) -> Result<Self> {
        let registry = Registry::new();
        let gauge = Gauge::with_opts(Opts::new(
            metric_name,
            format!("Metric for {}", metric_name),
        ))?;
        registry.register(Box::new(gauge.clone()))?;

        Ok(Self { registry, gauge })
    }

    /// Name the gauge was registered under.
    pub fn metric_name(&self) -> String {
        self.gauge
            .desc()
            .first()
            .map(|desc| desc.fq_name.clone())
            .unwrap_or_default()
    }

    pub fn set(&self, value: f64) {
        self.gauge.set(value);
    }

    pub fn get(&self) -> f64 {
        self.gauge.get()
    }

    /// Renders all metrics in Prometheus text format.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| Error::Internal(format!("Exposition is not valid UTF-8: {}", e)))
    }
}

impl std::fmt::Debug for TargetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetRegistry")
            .field("metric_name", &self.metric_name())
            .field("value", &self.get())
            .finish()
    }
}
