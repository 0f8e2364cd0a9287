//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for the logging/metrics stack shared by `keepstore` and
/// `keep-client` embedders.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line, e.g. `keepstore`.
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error), or a full
    /// `tracing-subscriber` `EnvFilter` directive string.
    pub log_level: String,

    /// Whether to emit JSON-formatted log lines instead of the compact
    /// human-readable format.
    pub json_logs: bool,

    /// Port the Prometheus text exporter listens on, when the `metrics`
    /// feature is enabled.
    pub metrics_port: u16,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "keepstore".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            metrics_port: 9090,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `KEEP_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `KEEP_JSON_LOGS`: Emit JSON logs (default: false)
    /// - `KEEP_METRICS_PORT`: Prometheus exporter port (default: 9090)
    pub fn from_env() -> Self {
        Self {
            service_name: env::var("KEEP_SERVICE_NAME").unwrap_or_else(|_| "keepstore".to_string()),

            log_level: env::var("KEEP_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("KEEP_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),

            metrics_port: env::var("KEEP_METRICS_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(9090),
        }
    }
}
