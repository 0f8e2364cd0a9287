//! # keep-telemetry
//!
//! Ambient logging and (optionally) metrics for keepstore and its client
//! embedders.
//!
//! - **Logging**: `tracing` + `tracing-subscriber`, installed once at
//!   startup via [`init_telemetry`].
//! - **Metrics**: a small Prometheus registry, compiled in only when the
//!   `metrics` feature is enabled. This is additive: it backs an optional
//!   `GET /metrics` endpoint, not anything named in the wire protocol.

mod config;
mod logging;
#[cfg(feature = "metrics")]
mod metrics;

pub use config::TelemetryConfig;
pub use logging::StructuredLogger;
#[cfg(feature = "metrics")]
pub use metrics::{register_metrics, MetricsHandle};

use thiserror::Error;

/// Telemetry initialization errors.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The subscriber was already installed for this process.
    #[error("telemetry already initialized: {0}")]
    AlreadyInitialized(String),

    /// The Prometheus registry rejected a metric (duplicate name, etc.).
    #[error("failed to initialize metrics: {0}")]
    MetricsInit(String),

    /// The supplied log level / filter directive did not parse.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Install the process-wide logging subscriber and, when the `metrics`
/// feature is enabled, the Prometheus registry.
///
/// Returns a guard; dropping it has no runtime effect but anchors the
/// telemetry stack's lifetime to the caller's scope for readability.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let logging = logging::init_logging(config)?;

    #[cfg(feature = "metrics")]
    let metrics = register_metrics()?;

    Ok(TelemetryGuard {
        _logging: logging,
        #[cfg(feature = "metrics")]
        _metrics: metrics,
    })
}

/// Guard returned by [`init_telemetry`]. Keep it alive for the life of the
/// process.
pub struct TelemetryGuard {
    _logging: StructuredLogger,
    #[cfg(feature = "metrics")]
    _metrics: MetricsHandle,
}
