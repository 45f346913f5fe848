//! Secret polynomials and their Feldman commitments.
//!
//! Keyper `i` is evaluated at `x = i + 1`; `x = 0` is reserved for the secret.

use bls12_381::{G2Affine, G2Projective, Scalar};
use ff::Field;
use group::Curve;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::serde_bls;
use crate::error::{DkgError, DkgResultT};

/// Evaluation point of keyper `index`.
pub fn keyper_x(index: u64) -> Scalar {
    Scalar::from(index) + Scalar::ONE
}

/// A polynomial over the BLS12-381 scalar field, lowest coefficient first.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polynomial(#[serde(with = "serde_bls::scalar_vec")] Vec<Scalar>);

impl Polynomial {
    /// Random polynomial of the given degree.
    pub fn random(degree: u64, mut rng: impl RngCore) -> Self {
        let coefficients = (0..=degree).map(|_| Scalar::random(&mut rng)).collect();
        Self(coefficients)
    }

    pub fn from_coefficients(coefficients: Vec<Scalar>) -> Self {
        Self(coefficients)
    }

    pub fn degree(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    /// The secret `f(0)`.
    pub fn constant(&self) -> Scalar {
        self.0.first().copied().unwrap_or(Scalar::ZERO)
    }

    pub fn eval(&self, x: &Scalar) -> Scalar {
        self.0
            .iter()
            .rev()
            .fold(Scalar::ZERO, |acc, coefficient| acc * x + coefficient)
    }

    pub fn eval_for_keyper(&self, index: u64) -> Scalar {
        self.eval(&keyper_x(index))
    }

    /// Commitments `C_m = a_m * g2`.
    pub fn gammas(&self) -> Gammas {
        let points: Vec<G2Projective> = self
            .0
            .iter()
            .map(|a| G2Projective::generator() * a)
            .collect();
        let mut affine = vec![G2Affine::identity(); points.len()];
        G2Projective::batch_normalize(&points, &mut affine);
        Gammas(affine)
    }
}

impl std::fmt::Debug for Polynomial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // coefficients are secret
        write!(f, "Polynomial(degree={})", self.degree())
    }
}

/// Feldman commitment to a polynomial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gammas(#[serde(with = "serde_bls::g2_vec")] pub Vec<G2Affine>);

impl Gammas {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Commitment to the secret `f(0)`.
    pub fn constant(&self) -> G2Projective {
        self.0
            .first()
            .map(G2Projective::from)
            .unwrap_or_else(G2Projective::identity)
    }

    /// `f(x) * g2`, computed from the commitments alone.
    pub fn eval(&self, x: &Scalar) -> G2Projective {
        self.0
            .iter()
            .rev()
            .fold(G2Projective::identity(), |acc, gamma| acc * x + gamma)
    }

    pub fn eval_for_keyper(&self, index: u64) -> G2Projective {
        self.eval(&keyper_x(index))
    }

    /// Check that `eval` is the value of the committed polynomial at keyper `index`.
    pub fn verify_eval(&self, index: u64, eval: &Scalar) -> bool {
        G2Projective::generator() * eval == self.eval_for_keyper(index)
    }

    /// Compressed points, 96 bytes each.
    pub fn to_bytes(&self) -> Vec<Vec<u8>> {
        self.0.iter().map(|g| g.to_compressed().to_vec()).collect()
    }

    pub fn from_bytes(raw: &[Vec<u8>]) -> DkgResultT<Self> {
        raw.iter()
            .map(|b| {
                serde_bls::g2_from_slice(b)
                    .ok_or_else(|| DkgError::Codec("invalid gamma point".to_string()))
            })
            .collect::<DkgResultT<Vec<_>>>()
            .map(Gammas)
    }
}

/// Canonical 32-byte little-endian encoding of a polynomial evaluation.
pub fn encode_eval(eval: &Scalar) -> Vec<u8> {
    eval.to_bytes().to_vec()
}

pub fn decode_eval(bytes: &[u8]) -> DkgResultT<Scalar> {
    serde_bls::scalar_from_slice(bytes)
        .ok_or_else(|| DkgError::Codec(format!("invalid poly eval ({} bytes)", bytes.len())))
}
