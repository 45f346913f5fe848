//! # Keyper Telemetry
//!
//! Logging initialisation and the Prometheus metrics capability shared by
//! every keyper subsystem.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` with an `EnvFilter`, plain or JSON output
//! - **Metrics**: [`KeyperMetrics`], registered on a caller-supplied
//!   [`prometheus::Registry`] and passed to constructors explicitly
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keyper_telemetry::{init_logging, KeyperMetrics, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_logging(&config)?;
//! let registry = prometheus::Registry::new();
//! let metrics = KeyperMetrics::new(&registry)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `KEYPER_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `KEYPER_JSON_LOGS` | `false` | Emit JSON lines instead of text |
//! | `KEYPER_SERVICE_NAME` | `keyper` | Service name attached to the startup log |

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{encode_metrics, KeyperMetrics};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Failed to encode metrics: {0}")]
    MetricsEncode(String),
}

impl From<prometheus::Error> for TelemetryError {
    fn from(e: prometheus::Error) -> Self {
        TelemetryError::MetricsInit(e.to_string())
    }
}
