//! Decryption triggers as the handler sees them.

use std::fmt;

use shared_bus::DecryptionTrigger;
use shared_types::{BlockNumber, EpochId, InstanceId};

/// A trigger plus how far it is trusted.
///
/// Triggers from gossip must carry the collator's signature. Triggers
/// submitted through the admin API come from the operator and skip the
/// signature check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRequest {
    pub trigger: DecryptionTrigger,
    pub verify_signature: bool,
}

impl TriggerRequest {
    pub fn from_gossip(trigger: DecryptionTrigger) -> Self {
        Self {
            trigger,
            verify_signature: true,
        }
    }

    /// An unsigned trigger built locally.
    pub fn admin(instance_id: InstanceId, epoch_id: EpochId, block_number: BlockNumber) -> Self {
        Self {
            trigger: DecryptionTrigger {
                instance_id,
                epoch_id,
                block_number,
                signature: Vec::new(),
            },
            verify_signature: false,
        }
    }
}

/// Why a trigger produced no share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDrop {
    WrongInstance,
    NoEon,
    NoDkgResult,
    DkgFailed,
    NotKeyper,
    AlreadyShared,
    NoCollator,
    BadSignature,
}

impl fmt::Display for TriggerDrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TriggerDrop::WrongInstance => "instance id mismatch",
            TriggerDrop::NoEon => "no eon for block",
            TriggerDrop::NoDkgResult => "dkg of eon not finished",
            TriggerDrop::DkgFailed => "dkg of eon failed",
            TriggerDrop::NotKeyper => "not a keyper of eon",
            TriggerDrop::AlreadyShared => "share already sent",
            TriggerDrop::NoCollator => "no collator for block",
            TriggerDrop::BadSignature => "not signed by collator",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_trigger_skips_signature() {
        let request = TriggerRequest::admin(3, EpochId::from_u64(1), 210);
        assert!(!request.verify_signature);
        assert!(request.trigger.signature.is_empty());
        assert_eq!(request.trigger.block_number, 210);
    }
}
