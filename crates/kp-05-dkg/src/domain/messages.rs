//! Messages exchanged between `PureDkg` instances.
//!
//! Transport is the consensus chain; the reducer converts between these and
//! the wire messages.

use bls12_381::Scalar;
use serde::{Deserialize, Serialize};
use shared_types::{EonIndex, KeyperIndex};

use super::serde_bls;

pub use super::polynomial::Gammas;

/// Dealer's commitment to its polynomial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolyCommitmentMsg {
    pub eon: EonIndex,
    pub sender: KeyperIndex,
    pub gammas: Gammas,
}

/// Dealer's polynomial evaluated at the receiver's point. Sent encrypted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolyEvalMsg {
    pub eon: EonIndex,
    pub sender: KeyperIndex,
    pub receiver: KeyperIndex,
    #[serde(with = "serde_bls::scalar")]
    pub eval: Scalar,
}

impl std::fmt::Debug for PolyEvalMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolyEvalMsg")
            .field("eon", &self.eon)
            .field("sender", &self.sender)
            .field("receiver", &self.receiver)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccusationMsg {
    pub eon: EonIndex,
    pub accuser: KeyperIndex,
    pub accused: KeyperIndex,
}

/// The accused dealer's answer: the disputed evaluation in clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApologyMsg {
    pub eon: EonIndex,
    pub accuser: KeyperIndex,
    pub accused: KeyperIndex,
    #[serde(with = "serde_bls::scalar")]
    pub eval: Scalar,
}
