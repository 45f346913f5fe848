//! Outcome of a successful DKG.

use serde::{Deserialize, Serialize};
use shared_types::{EonIndex, KeyperIndex};

use super::keys::{
    compute_epoch_secret_key_share, verify_epoch_secret_key, verify_epoch_secret_key_share,
    EonPublicKey, EonPublicKeyShare, EonSecretKeyShare, EpochSecretKey, EpochSecretKeyShare,
};
use crate::error::{DkgError, DkgResultT};
use shared_types::EpochId;

/// Everything a keyper needs to take part in epoch key generation.
///
/// Persisted bincode-encoded as the DKG result blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DkgResult {
    pub eon: EonIndex,
    pub num_keypers: u64,
    pub threshold: u64,
    pub keyper: KeyperIndex,
    pub secret_key_share: EonSecretKeyShare,
    pub public_key: EonPublicKey,
    pub public_key_shares: Vec<EonPublicKeyShare>,
}

impl DkgResult {
    pub fn encode(&self) -> DkgResultT<Vec<u8>> {
        bincode::serialize(self).map_err(|e| DkgError::Codec(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> DkgResultT<Self> {
        bincode::deserialize(bytes).map_err(|e| DkgError::Codec(e.to_string()))
    }

    pub fn public_key_share(&self, keyper: KeyperIndex) -> DkgResultT<&EonPublicKeyShare> {
        self.public_key_shares
            .get(keyper as usize)
            .ok_or(DkgError::InvalidIndex {
                index: keyper,
                num_keypers: self.num_keypers,
            })
    }

    /// This keyper's share for `epoch_id`.
    pub fn epoch_secret_key_share(&self, epoch_id: &EpochId) -> EpochSecretKeyShare {
        compute_epoch_secret_key_share(&self.secret_key_share, epoch_id)
    }

    /// Verify a peer's share against its public key share.
    pub fn verify_share(
        &self,
        keyper: KeyperIndex,
        share: &EpochSecretKeyShare,
        epoch_id: &EpochId,
    ) -> DkgResultT<bool> {
        let public_share = self.public_key_share(keyper)?;
        Ok(verify_epoch_secret_key_share(share, public_share, epoch_id))
    }

    pub fn verify_key(&self, key: &EpochSecretKey, epoch_id: &EpochId) -> bool {
        verify_epoch_secret_key(key, &self.public_key, epoch_id)
    }
}
