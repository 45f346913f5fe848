//! Trusted-dealer key generation.
//!
//! Produces the same key material a successful DKG would, without running
//! the protocol. Used by tests across the workspace and by local tooling.

use bls12_381::{G2Projective, Scalar};
use group::Curve;
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use shared_types::{EonIndex, KeyperIndex};

use crate::domain::keys::{EonPublicKey, EonPublicKeyShare, EonSecretKeyShare};
use crate::domain::polynomial::Polynomial;
use crate::domain::result::DkgResult;

/// Key material for a whole keyper set.
#[derive(Debug, Clone)]
pub struct EonKeys {
    pub num_keypers: u64,
    pub threshold: u64,
    pub secret: Scalar,
    pub public_key: EonPublicKey,
    pub secret_key_shares: Vec<EonSecretKeyShare>,
    pub public_key_shares: Vec<EonPublicKeyShare>,
}

impl EonKeys {
    pub fn generate(num_keypers: u64, threshold: u64) -> Self {
        Self::generate_with_rng(num_keypers, threshold, OsRng)
    }

    /// Deterministic keys.
    pub fn generate_seeded(num_keypers: u64, threshold: u64, seed: u64) -> Self {
        Self::generate_with_rng(num_keypers, threshold, StdRng::seed_from_u64(seed))
    }

    pub fn generate_with_rng(num_keypers: u64, threshold: u64, rng: impl RngCore) -> Self {
        let polynomial = Polynomial::random(threshold.saturating_sub(1), rng);
        let secret = polynomial.constant();
        let secret_key_shares: Vec<_> = (0..num_keypers)
            .map(|i| EonSecretKeyShare(polynomial.eval_for_keyper(i)))
            .collect();
        let public_key_shares = secret_key_shares
            .iter()
            .map(EonPublicKeyShare::from_secret)
            .collect();
        Self {
            num_keypers,
            threshold,
            secret,
            public_key: EonPublicKey((G2Projective::generator() * secret).to_affine()),
            secret_key_shares,
            public_key_shares,
        }
    }

    /// The result keyper `keyper` would hold after a DKG for `eon`.
    ///
    /// Panics if `keyper` is out of range; test helper only.
    pub fn dkg_result(&self, keyper: KeyperIndex, eon: EonIndex) -> DkgResult {
        DkgResult {
            eon,
            num_keypers: self.num_keypers,
            threshold: self.threshold,
            keyper,
            secret_key_share: self.secret_key_shares[keyper as usize].clone(),
            public_key: self.public_key,
            public_key_shares: self.public_key_shares.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_is_deterministic() {
        let a = EonKeys::generate_seeded(3, 2, 1);
        let b = EonKeys::generate_seeded(3, 2, 1);
        assert_eq!(a.public_key, b.public_key);
        assert_ne!(a.public_key, EonKeys::generate_seeded(3, 2, 2).public_key);
    }

    #[test]
    fn test_result_fields() {
        let keys = EonKeys::generate(4, 3);
        let result = keys.dkg_result(2, 11);
        assert_eq!(result.eon, 11);
        assert_eq!(result.keyper, 2);
        assert_eq!(result.public_key_shares.len(), 4);
    }
}
