//! Prometheus metrics for keepstore.
//!
//! Gated behind the `metrics` feature so the default build exposes exactly
//! the HTTP surface named in the wire protocol, with `GET /metrics` as a
//! strictly additive endpoint when the feature is turned on.

#![cfg(feature = "metrics")]

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry for this process.
    pub static ref REGISTRY: Registry = Registry::new();

    /// Buffers currently checked out of the buffer pool.
    pub static ref BUFFERS_IN_USE: Gauge = Gauge::new(
        "keep_buffer_pool_in_use",
        "Number of 64MiB buffers currently checked out of the pool"
    ).expect("metric creation failed");

    /// Configured buffer pool capacity.
    pub static ref BUFFERS_CAPACITY: Gauge = Gauge::new(
        "keep_buffer_pool_capacity",
        "Configured maximum number of concurrent buffers"
    ).expect("metric creation failed");

    /// Depth of the pull work queue.
    pub static ref PULL_QUEUE_DEPTH: Gauge = Gauge::new(
        "keep_pull_queue_depth",
        "Number of pull requests currently queued"
    ).expect("metric creation failed");

    /// Depth of the trash work queue.
    pub static ref TRASH_QUEUE_DEPTH: Gauge = Gauge::new(
        "keep_trash_queue_depth",
        "Number of trash requests currently queued"
    ).expect("metric creation failed");

    /// Per-volume read outcomes.
    pub static ref VOLUME_READS: CounterVec = CounterVec::new(
        Opts::new("keep_volume_reads_total", "Block reads per volume"),
        &["volume", "outcome"]
    ).expect("metric creation failed");

    /// Per-volume write outcomes.
    pub static ref VOLUME_WRITES: CounterVec = CounterVec::new(
        Opts::new("keep_volume_writes_total", "Block writes per volume"),
        &["volume", "outcome"]
    ).expect("metric creation failed");

    /// Requests rejected for exceeding the block size ceiling.
    pub static ref OVERSIZED_REJECTED: Counter = Counter::new(
        "keep_oversized_blocks_rejected_total",
        "Requests rejected for exceeding the block size ceiling"
    ).expect("metric creation failed");

    /// Free bytes per volume, as last reported by that volume's status.
    pub static ref VOLUME_FREE_BYTES: GaugeVec = GaugeVec::new(
        Opts::new("keep_volume_free_bytes", "Free bytes per volume"),
        &["volume"]
    ).expect("metric creation failed");
}

/// Handle for the metrics registry. Exists so callers have an owned value
/// to hold (e.g. in `AppState`) without reaching for the `lazy_static`
/// globals directly.
pub struct MetricsHandle {
    registry: Arc<Registry>,
}

/// Register all metrics with the global registry. Call once at startup.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(BUFFERS_IN_USE.clone()),
        Box::new(BUFFERS_CAPACITY.clone()),
        Box::new(PULL_QUEUE_DEPTH.clone()),
        Box::new(TRASH_QUEUE_DEPTH.clone()),
        Box::new(VOLUME_READS.clone()),
        Box::new(VOLUME_WRITES.clone()),
        Box::new(OVERSIZED_REJECTED.clone()),
        Box::new(VOLUME_FREE_BYTES.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        registry: Arc::new(REGISTRY.clone()),
    })
}

impl MetricsHandle {
    /// Encode the current state of every registered metric as Prometheus
    /// text format, for `GET /metrics`.
    pub fn encode(&self) -> Result<String, TelemetryError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
    }
}
