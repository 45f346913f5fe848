//! Gateway configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Time in-flight requests get to finish once shutdown starts.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub listen_address: SocketAddr,
    /// Whether endpoints that change node state are served.
    pub enable_write_operations: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from((Ipv4Addr::LOCALHOST, 3000)),
            enable_write_operations: false,
        }
    }
}
