//! HTTP server lifecycle.

use std::future::IntoFuture;

use axum::Router;
use shared_types::Shutdown;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::domain::config::{ApiConfig, SHUTDOWN_GRACE};
use crate::domain::error::{GatewayError, GatewayResult};
use crate::handlers::AppState;
use crate::router::build_router;

pub struct ApiServer {
    config: ApiConfig,
    state: AppState,
}

impl ApiServer {
    /// `state.enable_write_operations` is overridden by the config.
    pub fn new(config: ApiConfig, mut state: AppState) -> Self {
        state.enable_write_operations = config.enable_write_operations;
        Self { config, state }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Bind the listen address and serve until `shutdown` fires.
    pub async fn run(self, shutdown: &Shutdown) -> GatewayResult<()> {
        let listener = TcpListener::bind(self.config.listen_address)
            .await
            .map_err(GatewayError::Bind)?;
        info!(
            address = %self.config.listen_address,
            write_operations = self.config.enable_write_operations,
            "[api] listening"
        );
        serve(listener, build_router(self.state), shutdown).await
    }
}

/// Serve `router` on an already bound listener.
///
/// Once `shutdown` fires no new connections are accepted and in-flight
/// requests get [`SHUTDOWN_GRACE`] to finish before the server is dropped.
pub async fn serve(listener: TcpListener, router: Router, shutdown: &Shutdown) -> GatewayResult<()> {
    let signal = shutdown.clone();
    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move { signal.wait().await })
        .into_future();
    tokio::pin!(server);

    let deadline = async {
        shutdown.wait().await;
        tokio::time::sleep(SHUTDOWN_GRACE).await;
    };

    tokio::select! {
        result = &mut server => {
            result.map_err(GatewayError::Serve)?;
            info!("[api] stopped");
            Ok(())
        }
        _ = deadline => {
            warn!(grace = ?SHUTDOWN_GRACE, "[api] requests still open after grace period, dropping them");
            Ok(())
        }
    }
}
