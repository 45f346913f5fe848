//! # EpochKg
//!
//! Collects epoch secret key shares from peers and assembles the epoch key
//! once `threshold` verified shares for an epoch are present.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use shared_types::{EonIndex, EpochId, KeyperIndex};

use super::keys::{compute_epoch_secret_key, EpochSecretKey, EpochSecretKeyShare};
use super::result::DkgResult;
use crate::error::{DkgError, DkgResultT};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochSecretKeyShareMsg {
    pub eon: EonIndex,
    pub epoch_id: EpochId,
    pub sender: KeyperIndex,
    pub share: EpochSecretKeyShare,
}

#[derive(Debug, Clone)]
pub struct EpochKg {
    result: DkgResult,
    secret_shares: HashMap<EpochId, Vec<EpochSecretKeyShareMsg>>,
    secret_keys: HashMap<EpochId, EpochSecretKey>,
}

impl EpochKg {
    pub fn new(result: DkgResult) -> Self {
        Self {
            result,
            secret_shares: HashMap::new(),
            secret_keys: HashMap::new(),
        }
    }

    pub fn result(&self) -> &DkgResult {
        &self.result
    }

    /// This keyper's own share for `epoch_id`.
    pub fn compute_epoch_secret_key_share(&self, epoch_id: &EpochId) -> EpochSecretKeyShare {
        self.result.epoch_secret_key_share(epoch_id)
    }

    pub fn secret_key(&self, epoch_id: &EpochId) -> Option<&EpochSecretKey> {
        self.secret_keys.get(epoch_id)
    }

    /// Verify and store a share; assembles the key when the threshold is hit.
    ///
    /// Shares for an epoch whose key is already known are ignored.
    pub fn handle_epoch_secret_key_share(&mut self, msg: EpochSecretKeyShareMsg) -> DkgResultT<()> {
        if self.secret_keys.contains_key(&msg.epoch_id) {
            return Ok(());
        }
        if !self.result.verify_share(msg.sender, &msg.share, &msg.epoch_id)? {
            return Err(DkgError::InvalidShare { sender: msg.sender });
        }

        let shares = self.secret_shares.entry(msg.epoch_id).or_default();
        if shares.iter().any(|s| s.sender == msg.sender) {
            return Err(DkgError::Duplicate {
                kind: "epoch secret key share",
                sender: msg.sender,
            });
        }
        let epoch_id = msg.epoch_id;
        shares.push(msg);
        if shares.len() < self.result.threshold as usize {
            return Ok(());
        }

        let (indices, points): (Vec<_>, Vec<_>) =
            shares.iter().map(|s| (s.sender, s.share)).unzip();
        self.secret_shares.remove(&epoch_id);
        let key = compute_epoch_secret_key(&indices, &points, self.result.threshold)?;
        self.secret_keys.insert(epoch_id, key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkeygen::EonKeys;

    fn share_msg(keys: &EonKeys, sender: u64, epoch_id: EpochId) -> EpochSecretKeyShareMsg {
        EpochSecretKeyShareMsg {
            eon: 1,
            epoch_id,
            sender,
            share: keys.dkg_result(sender, 1).epoch_secret_key_share(&epoch_id),
        }
    }

    #[test]
    fn test_key_assembled_at_threshold() {
        let keys = EonKeys::generate(3, 2);
        let epoch = EpochId::from_u64(5);
        let mut kg = EpochKg::new(keys.dkg_result(0, 1));

        kg.handle_epoch_secret_key_share(share_msg(&keys, 2, epoch)).unwrap();
        assert!(kg.secret_key(&epoch).is_none());
        kg.handle_epoch_secret_key_share(share_msg(&keys, 1, epoch)).unwrap();

        let key = kg.secret_key(&epoch).unwrap();
        assert!(kg.result().verify_key(key, &epoch));
    }

    #[test]
    fn test_invalid_share_rejected() {
        let keys = EonKeys::generate(3, 2);
        let epoch = EpochId::from_u64(5);
        let mut kg = EpochKg::new(keys.dkg_result(0, 1));

        let mut msg = share_msg(&keys, 1, epoch);
        msg.sender = 2;
        assert_eq!(
            kg.handle_epoch_secret_key_share(msg),
            Err(DkgError::InvalidShare { sender: 2 })
        );
    }

    #[test]
    fn test_duplicate_share_rejected() {
        let keys = EonKeys::generate(3, 3);
        let epoch = EpochId::from_u64(5);
        let mut kg = EpochKg::new(keys.dkg_result(0, 1));

        kg.handle_epoch_secret_key_share(share_msg(&keys, 1, epoch)).unwrap();
        assert!(matches!(
            kg.handle_epoch_secret_key_share(share_msg(&keys, 1, epoch)),
            Err(DkgError::Duplicate { sender: 1, .. })
        ));
    }

    #[test]
    fn test_shares_after_key_ignored() {
        let keys = EonKeys::generate(2, 1);
        let epoch = EpochId::from_u64(5);
        let mut kg = EpochKg::new(keys.dkg_result(0, 1));
        kg.handle_epoch_secret_key_share(share_msg(&keys, 0, epoch)).unwrap();
        let mut bad = share_msg(&keys, 0, epoch);
        bad.sender = 1;
        assert!(kg.handle_epoch_secret_key_share(bad).is_ok());
    }

    #[test]
    fn test_out_of_range_sender() {
        let keys = EonKeys::generate(2, 2);
        let epoch = EpochId::from_u64(5);
        let mut kg = EpochKg::new(keys.dkg_result(0, 1));
        let mut msg = share_msg(&keys, 0, epoch);
        msg.sender = 7;
        assert!(matches!(
            kg.handle_epoch_secret_key_share(msg),
            Err(DkgError::InvalidIndex { index: 7, .. })
        ));
    }
}
