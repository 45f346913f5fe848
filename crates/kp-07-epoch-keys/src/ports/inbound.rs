//! Inbound ports: how triggers reach the epoch key service from outside
//! the gossip network.

use async_trait::async_trait;

use crate::domain::trigger::TriggerRequest;
use crate::error::EpochKeyResult;

/// Accepts triggers for asynchronous processing.
#[async_trait]
pub trait TriggerSink: Send + Sync {
    async fn submit_trigger(&self, request: TriggerRequest) -> EpochKeyResult<()>;
}
