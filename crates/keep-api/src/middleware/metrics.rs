//! Request counters for `GET /status.json` and, with the `metrics`
//! feature, a Prometheus text export.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Process-wide request counters. One instance lives in [`crate::state::AppState`]
/// and is shared across every handler.
#[derive(Default)]
pub struct ApiMetrics {
    pub gets_total: AtomicU64,
    pub gets_error: AtomicU64,
    pub puts_total: AtomicU64,
    pub puts_error: AtomicU64,
    pub deletes_total: AtomicU64,
    pub buffer_pool_waits: AtomicU64,
    total_latency_ms: AtomicU64,
    latency_samples: AtomicU64,
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_get(&self, success: bool, latency_ms: u64) {
        self.gets_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.gets_error.fetch_add(1, Ordering::Relaxed);
        }
        self.record_latency(latency_ms);
    }

    pub fn record_put(&self, success: bool, latency_ms: u64) {
        self.puts_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.puts_error.fetch_add(1, Ordering::Relaxed);
        }
        self.record_latency(latency_ms);
    }

    pub fn record_delete(&self) {
        self.deletes_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Recorded whenever a handler has to wait for [`crate::BufferPool::checkout`]
    /// rather than getting a permit immediately.
    pub fn record_buffer_pool_wait(&self) {
        self.buffer_pool_waits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_latency(&self, latency_ms: u64) {
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn average_latency_ms(&self) -> f64 {
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        let count = self.latency_samples.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "gets": {
                "total": self.gets_total.load(Ordering::Relaxed),
                "error": self.gets_error.load(Ordering::Relaxed),
            },
            "puts": {
                "total": self.puts_total.load(Ordering::Relaxed),
                "error": self.puts_error.load(Ordering::Relaxed),
            },
            "deletes": {
                "total": self.deletes_total.load(Ordering::Relaxed),
            },
            "buffer_pool_waits": self.buffer_pool_waits.load(Ordering::Relaxed),
            "latency": {
                "average_ms": self.average_latency_ms(),
            }
        })
    }

    #[cfg(feature = "metrics")]
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP keepstore_gets_total Blocks read\n\
             # TYPE keepstore_gets_total counter\n\
             keepstore_gets_total {}\n\
             # HELP keepstore_gets_error_total Failed reads\n\
             # TYPE keepstore_gets_error_total counter\n\
             keepstore_gets_error_total {}\n\
             # HELP keepstore_puts_total Blocks written\n\
             # TYPE keepstore_puts_total counter\n\
             keepstore_puts_total {}\n\
             # HELP keepstore_puts_error_total Failed writes\n\
             # TYPE keepstore_puts_error_total counter\n\
             keepstore_puts_error_total {}\n\
             # HELP keepstore_deletes_total Admin deletes processed\n\
             # TYPE keepstore_deletes_total counter\n\
             keepstore_deletes_total {}\n\
             # HELP keepstore_buffer_pool_waits_total Requests that had to wait for a buffer slot\n\
             # TYPE keepstore_buffer_pool_waits_total counter\n\
             keepstore_buffer_pool_waits_total {}\n\
             # HELP keepstore_average_latency_ms Average request latency\n\
             # TYPE keepstore_average_latency_ms gauge\n\
             keepstore_average_latency_ms {:.2}\n",
            self.gets_total.load(Ordering::Relaxed),
            self.gets_error.load(Ordering::Relaxed),
            self.puts_total.load(Ordering::Relaxed),
            self.puts_error.load(Ordering::Relaxed),
            self.deletes_total.load(Ordering::Relaxed),
            self.buffer_pool_waits.load(Ordering::Relaxed),
            self.average_latency_ms(),
        )
    }
}

/// Times one request; call `finish` with the outcome when it's done.
pub struct RequestTimer {
    start: Instant,
}

impl RequestTimer {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_and_put_counters_are_independent() {
        let metrics = ApiMetrics::new();
        metrics.record_get(true, 10);
        metrics.record_get(false, 20);
        metrics.record_put(true, 30);

        assert_eq!(metrics.gets_total.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.gets_error.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.puts_total.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.puts_error.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn average_latency_tracks_gets_and_puts_together() {
        let metrics = ApiMetrics::new();
        metrics.record_get(true, 100);
        metrics.record_put(true, 300);
        assert!((metrics.average_latency_ms() - 200.0).abs() < 0.01);
    }

    #[test]
    fn json_export_reports_recorded_counters() {
        let metrics = ApiMetrics::new();
        metrics.record_get(true, 5);
        metrics.record_delete();
        let json = metrics.to_json();
        assert_eq!(json["gets"]["total"], 1);
        assert_eq!(json["deletes"]["total"], 1);
    }
}
