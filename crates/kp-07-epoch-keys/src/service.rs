//! # Epoch Key Service
//!
//! Fans triggers from the admin API and messages from gossip into the
//! [`EpochKeyHandler`] one at a time and publishes whatever it returns.
//!
//! ```text
//! TriggerQueue ──► mpsc ──┐
//!                         ├──► EpochKeyHandler ──► Messaging::send
//! Subscription ───────────┘
//! ```
//!
//! Handler errors are logged and the message is dropped. A closed gossip
//! network stops the service.

use std::sync::Arc;

use async_trait::async_trait;
use shared_bus::{BusError, Messaging, P2PMessage, Topic};
use shared_types::Shutdown;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::domain::trigger::TriggerRequest;
use crate::error::{EpochKeyError, EpochKeyResult};
use crate::handler::EpochKeyHandler;
use crate::ports::inbound::TriggerSink;

/// Triggers buffered between the admin API and the service.
pub const TRIGGER_QUEUE_CAPACITY: usize = 100;

/// Sending half of the trigger queue.
#[derive(Debug, Clone)]
pub struct TriggerQueue {
    sender: mpsc::Sender<TriggerRequest>,
}

pub fn trigger_channel(capacity: usize) -> (TriggerQueue, mpsc::Receiver<TriggerRequest>) {
    let (sender, receiver) = mpsc::channel(capacity);
    (TriggerQueue { sender }, receiver)
}

#[async_trait]
impl TriggerSink for TriggerQueue {
    async fn submit_trigger(&self, request: TriggerRequest) -> EpochKeyResult<()> {
        self.sender.try_send(request).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => EpochKeyError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => EpochKeyError::QueueClosed,
        })
    }
}

pub struct EpochKeyService {
    handler: Arc<EpochKeyHandler>,
    messaging: Arc<dyn Messaging>,
    triggers: Mutex<mpsc::Receiver<TriggerRequest>>,
}

impl EpochKeyService {
    /// Registers `handler` as the gossip validator for the trigger, share
    /// and key topics.
    pub fn new(
        handler: Arc<EpochKeyHandler>,
        messaging: Arc<dyn Messaging>,
        triggers: mpsc::Receiver<TriggerRequest>,
    ) -> Self {
        for topic in [
            Topic::DecryptionTrigger,
            Topic::DecryptionKeyShare,
            Topic::DecryptionKey,
        ] {
            messaging.add_validator(topic, handler.clone());
        }
        Self {
            handler,
            messaging,
            triggers: Mutex::new(triggers),
        }
    }

    /// Process inputs until `shutdown` fires.
    pub async fn run(&self, shutdown: &Shutdown) -> EpochKeyResult<()> {
        let mut subscription = self.messaging.subscribe();
        let mut triggers = self.triggers.lock().await;
        let mut triggers_open = true;
        info!(instance_id = self.handler.instance_id(), "[epoch-keys] started");

        loop {
            let res = tokio::select! {
                _ = shutdown.wait() => {
                    info!("[epoch-keys] stopped");
                    return Ok(());
                }
                msg = subscription.recv() => match msg {
                    Some(msg) => {
                        debug!(topic = %msg.topic(), msg = %msg.log_info(), "[epoch-keys] received");
                        self.handler.handle_message(&msg).await
                    }
                    None => {
                        error!("[epoch-keys] gossip network closed");
                        return Err(EpochKeyError::Bus(BusError::Closed));
                    }
                },
                request = triggers.recv(), if triggers_open => match request {
                    Some(request) => self.handler.handle_trigger(&request).await,
                    None => {
                        debug!("[epoch-keys] trigger queue closed");
                        triggers_open = false;
                        continue;
                    }
                },
            };

            match res {
                Ok(outgoing) => self.publish(outgoing).await?,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => warn!(error = %err, "[epoch-keys] failed to handle message"),
            }
        }
    }

    async fn publish(&self, msgs: Vec<P2PMessage>) -> EpochKeyResult<()> {
        for msg in msgs {
            let summary = msg.log_info();
            if let Err(err) = self.messaging.send(msg).await {
                let err = EpochKeyError::from(err);
                if err.is_fatal() {
                    return Err(err);
                }
                warn!(msg = %summary, error = %err, "[epoch-keys] failed to publish");
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for EpochKeyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpochKeyService")
            .field("handler", &self.handler)
            .finish_non_exhaustive()
    }
}
