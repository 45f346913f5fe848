//! # Subscriptions
//!
//! Inbound side of an `InMemoryGossip` endpoint.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::messages::P2PMessage;
use crate::publisher::Frame;
use crate::validator::{ValidationResult, ValidatorRegistry};

pub struct Subscription {
    receiver: broadcast::Receiver<Frame>,
    own_peer: u64,
    validators: Arc<ValidatorRegistry>,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<Frame>,
        own_peer: u64,
        validators: Arc<ValidatorRegistry>,
    ) -> Self {
        Self {
            receiver,
            own_peer,
            validators,
        }
    }

    /// Next accepted message from another peer. `None` once the network is gone.
    pub async fn recv(&mut self) -> Option<P2PMessage> {
        loop {
            let frame = match self.receiver.recv().await {
                Ok(frame) => frame,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(lagged = count, "gossip subscriber lagged, messages dropped");
                    continue;
                }
            };
            if frame.from == self.own_peer {
                continue;
            }

            let msg = match P2PMessage::decode(&frame.data) {
                Ok(msg) => msg,
                Err(err) => {
                    warn!(from = frame.from, error = %err, "undecodable gossip message");
                    continue;
                }
            };

            match self.validators.validate(&msg).await {
                ValidationResult::Accept => return Some(msg),
                ValidationResult::Reject => {
                    debug!(topic = %msg.topic(), msg = %msg.log_info(), "message rejected");
                }
                ValidationResult::Ignore => {
                    debug!(topic = %msg.topic(), msg = %msg.log_info(), "message ignored");
                }
            }
        }
    }
}
