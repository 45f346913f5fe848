//! # KP-09 API Gateway
//!
//! Admin HTTP surface of a keyper node.
//!
//! ```text
//!   operator ──HTTP──▶ router ──▶ handlers ──┬──▶ Database (read only)
//!                                            ├──▶ TriggerSink ──▶ kp-07 epoch keys
//!                                            └──▶ prometheus Registry
//! ```
//!
//! Reads go straight to storage. The only write, `POST /v1/decryption-trigger`,
//! is refused with 403 unless `enable_write_operations` is set, and is handed
//! to the epoch key service through its bounded trigger queue. A full queue
//! answers 503.
//!
//! Errors are JSON bodies of the form `{"code": "not_found", "message": ".."}`.

pub mod domain;
pub mod handlers;
pub mod router;
pub mod service;

pub use domain::config::{ApiConfig, SHUTDOWN_GRACE};
pub use domain::error::{ApiError, GatewayError, GatewayResult};
pub use domain::types::{EonInfo, TriggerBody};
pub use handlers::AppState;
pub use router::{build_metrics_router, build_router};
pub use service::{serve, ApiServer};
