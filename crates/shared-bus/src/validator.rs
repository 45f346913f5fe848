//! # Gossip Validators
//!
//! Every inbound message runs through the validators registered for its
//! topic. The instance check applies to all topics and runs first.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::InstanceId;
use tracing::debug;

use crate::messages::{P2PMessage, Topic};

/// Outcome of validating one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationResult {
    /// Deliver and propagate.
    Accept,
    /// Invalid; drop and do not propagate.
    Reject,
    /// Not invalid but not useful here; drop silently.
    Ignore,
}

#[async_trait]
pub trait MessageValidator: Send + Sync {
    async fn validate(&self, msg: &P2PMessage) -> ValidationResult;
}

pub struct ValidatorRegistry {
    instance_id: InstanceId,
    validators: RwLock<HashMap<Topic, Vec<Arc<dyn MessageValidator>>>>,
}

impl ValidatorRegistry {
    pub fn new(instance_id: InstanceId) -> Self {
        Self {
            instance_id,
            validators: RwLock::new(HashMap::new()),
        }
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    pub fn add_validator(&self, topic: Topic, validator: Arc<dyn MessageValidator>) {
        self.validators.write().entry(topic).or_default().push(validator);
    }

    /// The first non-accepting validator decides.
    pub async fn validate(&self, msg: &P2PMessage) -> ValidationResult {
        if msg.instance_id() != self.instance_id {
            debug!(
                topic = %msg.topic(),
                got = msg.instance_id(),
                expected = self.instance_id,
                "instance id mismatch"
            );
            return ValidationResult::Reject;
        }

        // clone out so no lock is held across await
        let validators = self
            .validators
            .read()
            .get(&msg.topic())
            .cloned()
            .unwrap_or_default();
        for validator in validators {
            let result = validator.validate(msg).await;
            if result != ValidationResult::Accept {
                return result;
            }
        }
        ValidationResult::Accept
    }
}

impl std::fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("instance_id", &self.instance_id)
            .field("topics", &self.validators.read().len())
            .finish()
    }
}
