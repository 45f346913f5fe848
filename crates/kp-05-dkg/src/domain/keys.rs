//! Eon and epoch key material, and the threshold operations on it.
//!
//! Reference: Boneh-Lynn-Shacham style threshold key extraction. The epoch
//! point `H(e)` is hashed to G1 with the SSWU map (RFC 9380, XMD:SHA-256).

use bls12_381::hash_to_curve::{ExpandMsgXmd, HashToCurve};
use bls12_381::{pairing, G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use ff::Field;
use group::Curve;
use serde::{Deserialize, Serialize};
use shared_types::{EpochId, KeyperIndex};

use super::polynomial::keyper_x;
use super::serde_bls;
use crate::error::{DkgError, DkgResultT};

/// Domain separation tag for hashing epoch ids to G1.
pub const EPOCH_DST: &[u8] = b"SHUTTER_KEYPER_EPOCH_BLS12381G1_XMD:SHA-256_SSWU_RO_";

/// Compressed G1 size.
pub const G1_LEN: usize = 48;
/// Compressed G2 size.
pub const G2_LEN: usize = 96;

// =============================================================================
// EON KEYS
// =============================================================================

/// This keyper's share of the eon secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EonSecretKeyShare(#[serde(with = "serde_bls::scalar")] pub Scalar);

impl std::fmt::Debug for EonSecretKeyShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EonSecretKeyShare(..)")
    }
}

/// Public counterpart of one keyper's secret share, `s_i * g2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EonPublicKeyShare(#[serde(with = "serde_bls::g2")] pub G2Affine);

/// The eon public key, `s * g2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EonPublicKey(#[serde(with = "serde_bls::g2")] pub G2Affine);

impl EonPublicKeyShare {
    pub fn from_secret(secret: &EonSecretKeyShare) -> Self {
        Self((G2Projective::generator() * secret.0).to_affine())
    }
}

impl EonPublicKey {
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_compressed().to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> DkgResultT<Self> {
        serde_bls::g2_from_slice(bytes)
            .map(Self)
            .ok_or_else(|| DkgError::Codec("invalid eon public key".to_string()))
    }
}

// =============================================================================
// EPOCH KEYS
// =============================================================================

/// One keyper's share of an epoch key, `s_i * H(e)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochSecretKeyShare(#[serde(with = "serde_bls::g1")] pub G1Affine);

/// The assembled epoch key, `s * H(e)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochSecretKey(#[serde(with = "serde_bls::g1")] pub G1Affine);

impl EpochSecretKeyShare {
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_compressed().to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> DkgResultT<Self> {
        serde_bls::g1_from_slice(bytes)
            .map(Self)
            .ok_or_else(|| DkgError::Codec("invalid epoch secret key share".to_string()))
    }
}

impl EpochSecretKey {
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_compressed().to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> DkgResultT<Self> {
        serde_bls::g1_from_slice(bytes)
            .map(Self)
            .ok_or_else(|| DkgError::Codec("invalid epoch secret key".to_string()))
    }
}

/// `H(e)`: the G1 point an epoch's keys are derived from.
pub fn epoch_point(epoch_id: &EpochId) -> G1Affine {
    <G1Projective as HashToCurve<ExpandMsgXmd<sha2::Sha256>>>::hash_to_curve(
        epoch_id.as_bytes(),
        EPOCH_DST,
    )
    .to_affine()
}

pub fn compute_epoch_secret_key_share(
    secret: &EonSecretKeyShare,
    epoch_id: &EpochId,
) -> EpochSecretKeyShare {
    EpochSecretKeyShare((G1Projective::from(epoch_point(epoch_id)) * secret.0).to_affine())
}

/// `e(share, g2) == e(H(e), P_i)`
pub fn verify_epoch_secret_key_share(
    share: &EpochSecretKeyShare,
    public_key_share: &EonPublicKeyShare,
    epoch_id: &EpochId,
) -> bool {
    pairing(&share.0, &G2Affine::generator())
        == pairing(&epoch_point(epoch_id), &public_key_share.0)
}

/// `e(key, g2) == e(H(e), P)`
pub fn verify_epoch_secret_key(
    key: &EpochSecretKey,
    eon_public_key: &EonPublicKey,
    epoch_id: &EpochId,
) -> bool {
    pairing(&key.0, &G2Affine::generator()) == pairing(&epoch_point(epoch_id), &eon_public_key.0)
}

/// Lagrange coefficient at zero for `x_i` within the set `xs`.
fn lagrange_at_zero(i: usize, xs: &[Scalar]) -> DkgResultT<Scalar> {
    let mut numerator = Scalar::ONE;
    let mut denominator = Scalar::ONE;
    for (j, x_j) in xs.iter().enumerate() {
        if i == j {
            continue;
        }
        numerator *= x_j;
        denominator *= x_j - xs[i];
    }
    let inverse: Option<Scalar> = denominator.invert().into();
    inverse
        .map(|inv| numerator * inv)
        .ok_or_else(|| DkgError::InvalidParameters("degenerate interpolation set".to_string()))
}

/// Interpolate the epoch key from shares of keypers `indices`.
///
/// Uses the first `threshold` shares; fewer is an error.
pub fn compute_epoch_secret_key(
    indices: &[KeyperIndex],
    shares: &[EpochSecretKeyShare],
    threshold: u64,
) -> DkgResultT<EpochSecretKey> {
    if indices.len() != shares.len() {
        return Err(DkgError::InvalidParameters(format!(
            "{} indices for {} shares",
            indices.len(),
            shares.len()
        )));
    }
    let need = threshold as usize;
    if need == 0 || shares.len() < need {
        return Err(DkgError::NotEnoughShares {
            have: shares.len(),
            need,
        });
    }

    let indices = &indices[..need];
    for (pos, index) in indices.iter().enumerate() {
        if indices[..pos].contains(index) {
            return Err(DkgError::DuplicateShareIndex(*index));
        }
    }

    let xs: Vec<Scalar> = indices.iter().map(|i| keyper_x(*i)).collect();
    let mut key = G1Projective::identity();
    for (pos, share) in shares[..need].iter().enumerate() {
        key += G1Projective::from(share.0) * lagrange_at_zero(pos, &xs)?;
    }
    Ok(EpochSecretKey(key.to_affine()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkeygen::EonKeys;
    use proptest::prelude::*;

    #[test]
    fn test_share_verifies_against_own_public_share() {
        let keys = EonKeys::generate(3, 2);
        let epoch = EpochId::from_u64(1);
        let share = compute_epoch_secret_key_share(&keys.secret_key_shares[0], &epoch);

        assert!(verify_epoch_secret_key_share(&share, &keys.public_key_shares[0], &epoch));
        assert!(!verify_epoch_secret_key_share(&share, &keys.public_key_shares[1], &epoch));
        assert!(!verify_epoch_secret_key_share(
            &share,
            &keys.public_key_shares[0],
            &EpochId::from_u64(2)
        ));
    }

    #[test]
    fn test_threshold_key_verifies() {
        let keys = EonKeys::generate(3, 2);
        let epoch = EpochId::from_u64(7);
        let shares: Vec<_> = [0u64, 2]
            .iter()
            .map(|i| compute_epoch_secret_key_share(&keys.secret_key_shares[*i as usize], &epoch))
            .collect();

        let key = compute_epoch_secret_key(&[0, 2], &shares, 2).unwrap();
        assert!(verify_epoch_secret_key(&key, &keys.public_key, &epoch));
        assert!(!verify_epoch_secret_key(
            &key,
            &keys.public_key,
            &EpochId::from_u64(8)
        ));
    }

    #[test]
    fn test_not_enough_shares() {
        let keys = EonKeys::generate(3, 2);
        let epoch = EpochId::from_u64(1);
        let share = compute_epoch_secret_key_share(&keys.secret_key_shares[0], &epoch);
        assert_eq!(
            compute_epoch_secret_key(&[0], &[share], 2),
            Err(DkgError::NotEnoughShares { have: 1, need: 2 })
        );
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let keys = EonKeys::generate(3, 2);
        let epoch = EpochId::from_u64(1);
        let share = compute_epoch_secret_key_share(&keys.secret_key_shares[0], &epoch);
        assert_eq!(
            compute_epoch_secret_key(&[0, 0], &[share, share], 2),
            Err(DkgError::DuplicateShareIndex(0))
        );
    }

    #[test]
    fn test_key_bytes() {
        let keys = EonKeys::generate(1, 1);
        let epoch = EpochId::from_u64(3);
        let share = compute_epoch_secret_key_share(&keys.secret_key_shares[0], &epoch);
        let raw = share.to_bytes();
        assert_eq!(raw.len(), G1_LEN);
        assert_eq!(EpochSecretKeyShare::from_bytes(&raw).unwrap(), share);
        assert_eq!(keys.public_key.to_bytes().len(), G2_LEN);
        assert!(EpochSecretKey::from_bytes(&raw[..10]).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_any_threshold_subset_gives_same_key(
            picks in proptest::sample::subsequence(vec![0u64, 1, 2, 3, 4], 3),
            epoch in any::<u64>(),
        ) {
            let keys = EonKeys::generate_seeded(5, 3, 42);
            let epoch = EpochId::from_u64(epoch);
            let shares: Vec<_> = picks
                .iter()
                .map(|i| compute_epoch_secret_key_share(&keys.secret_key_shares[*i as usize], &epoch))
                .collect();

            let key = compute_epoch_secret_key(&picks, &shares, 3).unwrap();
            let expected = EpochSecretKey(
                (G1Projective::from(epoch_point(&epoch)) * keys.secret).to_affine(),
            );
            prop_assert_eq!(key, expected);
        }
    }
}
