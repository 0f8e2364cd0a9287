//! Structured logging via `tracing` + `tracing-subscriber`.

use tracing_subscriber::{fmt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Handle to the installed global subscriber. Dropping it has no effect —
/// the subscriber stays installed for the process lifetime — it exists
/// only so callers have something to hold onto near the top of `main`.
pub struct StructuredLogger {
    _private: (),
}

/// Install the process-wide tracing subscriber.
///
/// Must be called at most once per process; a second call returns
/// [`TelemetryError::AlreadyInitialized`].
pub fn init_logging(config: &TelemetryConfig) -> Result<StructuredLogger, TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(e.to_string()))?;

    let subscriber = fmt().with_env_filter(filter).with_target(true);

    let result = if config.json_logs {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };

    result.map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;

    Ok(StructuredLogger { _private: () })
}

/// Log a volume-level event with standard fields.
#[macro_export]
macro_rules! log_volume_event {
    ($level:ident, $volume:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            volume = %$volume,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a block-level event with standard fields.
#[macro_export]
macro_rules! log_block_event {
    ($level:ident, $locator:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            locator = %$locator,
            $($($field)*,)?
            $msg
        )
    };
}
