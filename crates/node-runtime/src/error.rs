//! Errors surfaced to the supervisor.

use keyper_telemetry::TelemetryError;
use kp_02_storage::StorageError;
use kp_03_event_syncer::SyncerError;
use kp_04_chain_observer::ObserverError;
use kp_06_shuttermint::{ClientError, DriverError, SenderError};
use kp_07_epoch_keys::EpochKeyError;
use kp_08_eon_publisher::PublisherError;
use kp_09_api_gateway::GatewayError;
use shared_bus::BusError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyperError {
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The database belongs to another keyper.
    #[error("database linked to wrong address {stored}, config address is {configured}")]
    AddressMismatch { stored: String, configured: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("ethereum error: {0}")]
    Ethereum(#[from] SyncerError),

    #[error("chain observer error: {0}")]
    Observer(#[from] ObserverError),

    #[error("shuttermint client error: {0}")]
    Shuttermint(#[from] ClientError),

    #[error("shuttermint driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("outbound message error: {0}")]
    Sender(#[from] SenderError),

    #[error("epoch key error: {0}")]
    EpochKeys(#[from] EpochKeyError),

    #[error("eon key publisher error: {0}")]
    Publisher(#[from] PublisherError),

    #[error("http server error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("gossip error: {0}")]
    Gossip(#[from] BusError),

    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("task {0} panicked")]
    TaskPanicked(String),
}

impl KeyperError {
    /// Whether the orchestrator loop must stop. Everything else is logged
    /// and retried on the next tick.
    pub fn is_fatal(&self) -> bool {
        match self {
            KeyperError::Driver(err) => !matches!(err, DriverError::Client(_)),
            _ => true,
        }
    }
}

pub type KeyperResult<T> = Result<T, KeyperError>;
