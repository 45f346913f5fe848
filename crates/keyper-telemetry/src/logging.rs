//! Structured logging setup.
//!
//! Text output for terminals, JSON lines for log shippers. Fields attached
//! with `tracing` macros (`eon = ..`, `block = ..`) are preserved in both.

use tracing_subscriber::{fmt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Install the global subscriber.
///
/// Returns an error if the filter directive is invalid. A subscriber that is
/// already installed (tests, embedding) is left in place.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .with_thread_ids(true);

    let installed = if config.json_logs {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        tracing::debug!(
            service = %config.service_name,
            json_logs = config.json_logs,
            "Logging initialized"
        );
    }
    Ok(())
}
