//! # PureDkg
//!
//! State machine for one eon's distributed key generation. It performs no
//! I/O: callers feed it messages in consensus order, move it through the
//! phases on height boundaries and persist it between calls.
//!
//! ## Qualification
//!
//! A dealer is qualified if it published a commitment of the right size and
//! every accusation against it was answered with a valid apology.

use std::collections::{BTreeMap, BTreeSet};

use bls12_381::{G2Projective, Scalar};
use ff::Field;
use group::Curve;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use shared_types::{EonIndex, KeyperIndex};
use tracing::{debug, warn};

use super::keys::{EonPublicKey, EonPublicKeyShare, EonSecretKeyShare};
use super::messages::{AccusationMsg, ApologyMsg, PolyCommitmentMsg, PolyEvalMsg};
use super::phase::Phase;
use super::polynomial::{Gammas, Polynomial};
use super::result::DkgResult;
use super::serde_bls;
use crate::error::{DkgError, DkgResultT};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PureDkg {
    pub eon: EonIndex,
    pub num_keypers: u64,
    pub threshold: u64,
    pub keyper: KeyperIndex,
    pub phase: Phase,

    polynomial: Option<Polynomial>,
    commitments: BTreeMap<KeyperIndex, Gammas>,
    /// Evaluations received by this keyper, keyed by dealer.
    #[serde(with = "serde_bls::scalar_map")]
    evals: BTreeMap<KeyperIndex, Scalar>,
    /// `(accuser, accused)`
    accusations: BTreeSet<(KeyperIndex, KeyperIndex)>,
    /// Accusations answered with a valid evaluation.
    apologies: BTreeSet<(KeyperIndex, KeyperIndex)>,
}

impl PureDkg {
    pub fn new(
        eon: EonIndex,
        num_keypers: u64,
        threshold: u64,
        keyper: KeyperIndex,
    ) -> DkgResultT<Self> {
        if threshold == 0 || threshold > num_keypers {
            return Err(DkgError::InvalidParameters(format!(
                "threshold {threshold} for {num_keypers} keypers"
            )));
        }
        if keyper >= num_keypers {
            return Err(DkgError::InvalidIndex {
                index: keyper,
                num_keypers,
            });
        }
        Ok(Self {
            eon,
            num_keypers,
            threshold,
            keyper,
            phase: Phase::Off,
            polynomial: None,
            commitments: BTreeMap::new(),
            evals: BTreeMap::new(),
            accusations: BTreeSet::new(),
            apologies: BTreeSet::new(),
        })
    }

    /// Bincode blob stored in the DKG state table.
    pub fn encode(&self) -> DkgResultT<Vec<u8>> {
        bincode::serialize(self).map_err(|e| DkgError::Codec(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> DkgResultT<Self> {
        bincode::deserialize(bytes).map_err(|e| DkgError::Codec(e.to_string()))
    }

    fn require_phase(&self, expected: Phase) -> DkgResultT<()> {
        if self.phase != expected {
            return Err(DkgError::WrongPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    fn check_index(&self, index: KeyperIndex) -> DkgResultT<()> {
        if index >= self.num_keypers {
            return Err(DkgError::InvalidIndex {
                index,
                num_keypers: self.num_keypers,
            });
        }
        Ok(())
    }

    // =========================================================================
    // PHASE 1: DEALING
    // =========================================================================

    /// Pick the secret polynomial. Returns the commitment to broadcast and one
    /// evaluation per other keyper.
    pub fn start_phase1_dealing(
        &mut self,
        rng: impl RngCore,
    ) -> DkgResultT<(PolyCommitmentMsg, Vec<PolyEvalMsg>)> {
        self.require_phase(Phase::Off)?;

        let polynomial = Polynomial::random(self.threshold - 1, rng);
        let commitment = PolyCommitmentMsg {
            eon: self.eon,
            sender: self.keyper,
            gammas: polynomial.gammas(),
        };
        let evals = (0..self.num_keypers)
            .filter(|j| *j != self.keyper)
            .map(|j| PolyEvalMsg {
                eon: self.eon,
                sender: self.keyper,
                receiver: j,
                eval: polynomial.eval_for_keyper(j),
            })
            .collect();

        // own evaluation never travels; own commitment arrives through consensus
        self.evals
            .insert(self.keyper, polynomial.eval_for_keyper(self.keyper));
        self.polynomial = Some(polynomial);
        self.phase = Phase::Dealing;
        Ok((commitment, evals))
    }

    pub fn handle_poly_commitment(&mut self, msg: PolyCommitmentMsg) -> DkgResultT<()> {
        if self.phase > Phase::Dealing {
            return Err(DkgError::WrongPhase {
                expected: Phase::Dealing,
                actual: self.phase,
            });
        }
        self.check_index(msg.sender)?;
        if msg.gammas.len() != self.threshold as usize {
            return Err(DkgError::InvalidCommitment {
                sender: msg.sender,
                expected: self.threshold as usize,
                actual: msg.gammas.len(),
            });
        }
        if self.commitments.contains_key(&msg.sender) {
            return Err(DkgError::Duplicate {
                kind: "poly commitment",
                sender: msg.sender,
            });
        }
        self.commitments.insert(msg.sender, msg.gammas);
        Ok(())
    }

    pub fn handle_poly_eval(&mut self, msg: PolyEvalMsg) -> DkgResultT<()> {
        if self.phase > Phase::Dealing {
            return Err(DkgError::WrongPhase {
                expected: Phase::Dealing,
                actual: self.phase,
            });
        }
        self.check_index(msg.sender)?;
        if msg.receiver != self.keyper {
            return Err(DkgError::WrongReceiver {
                receiver: msg.receiver,
            });
        }
        if msg.sender == self.keyper || self.evals.contains_key(&msg.sender) {
            return Err(DkgError::Duplicate {
                kind: "poly eval",
                sender: msg.sender,
            });
        }
        self.evals.insert(msg.sender, msg.eval);
        Ok(())
    }

    // =========================================================================
    // PHASE 2: ACCUSING
    // =========================================================================

    fn has_valid_eval(&self, dealer: KeyperIndex) -> bool {
        match (self.commitments.get(&dealer), self.evals.get(&dealer)) {
            (Some(gammas), Some(eval)) => gammas.verify_eval(self.keyper, eval),
            _ => false,
        }
    }

    /// Accuse every dealer that committed but whose evaluation for us is
    /// missing or inconsistent with its commitment.
    pub fn start_phase2_accusing(&mut self) -> DkgResultT<Vec<AccusationMsg>> {
        self.require_phase(Phase::Dealing)?;
        let accusations = self
            .commitments
            .keys()
            .copied()
            .filter(|dealer| !self.has_valid_eval(*dealer))
            .map(|accused| AccusationMsg {
                eon: self.eon,
                accuser: self.keyper,
                accused,
            })
            .collect::<Vec<_>>();
        for accusation in &accusations {
            debug!(eon = self.eon, accused = accusation.accused, "accusing dealer");
        }
        self.phase = Phase::Accusing;
        Ok(accusations)
    }

    pub fn handle_accusation(&mut self, msg: AccusationMsg) -> DkgResultT<()> {
        self.require_phase(Phase::Accusing)?;
        self.check_index(msg.accuser)?;
        self.check_index(msg.accused)?;
        if !self.accusations.insert((msg.accuser, msg.accused)) {
            return Err(DkgError::Duplicate {
                kind: "accusation",
                sender: msg.accuser,
            });
        }
        Ok(())
    }

    // =========================================================================
    // PHASE 3: APOLOGIZING
    // =========================================================================

    /// Answer every accusation against this keyper.
    pub fn start_phase3_apologizing(&mut self) -> DkgResultT<Vec<ApologyMsg>> {
        self.require_phase(Phase::Accusing)?;
        let apologies = match &self.polynomial {
            Some(polynomial) => self
                .accusations
                .iter()
                .filter(|(_, accused)| *accused == self.keyper)
                .map(|(accuser, _)| ApologyMsg {
                    eon: self.eon,
                    accuser: *accuser,
                    accused: self.keyper,
                    eval: polynomial.eval_for_keyper(*accuser),
                })
                .collect(),
            None => Vec::new(),
        };
        self.phase = Phase::Apologizing;
        Ok(apologies)
    }

    pub fn handle_apology(&mut self, msg: ApologyMsg) -> DkgResultT<()> {
        self.require_phase(Phase::Apologizing)?;
        let key = (msg.accuser, msg.accused);
        if !self.accusations.contains(&key) {
            return Err(DkgError::UnknownAccusation {
                accuser: msg.accuser,
                accused: msg.accused,
            });
        }
        if self.apologies.contains(&key) {
            return Err(DkgError::Duplicate {
                kind: "apology",
                sender: msg.accused,
            });
        }
        let valid = self
            .commitments
            .get(&msg.accused)
            .is_some_and(|gammas| gammas.verify_eval(msg.accuser, &msg.eval));
        if !valid {
            return Err(DkgError::InvalidApology {
                accuser: msg.accuser,
                accused: msg.accused,
            });
        }
        self.apologies.insert(key);
        if msg.accuser == self.keyper {
            self.evals.insert(msg.accused, msg.eval);
        }
        Ok(())
    }

    // =========================================================================
    // PHASE 4: FINALIZED
    // =========================================================================

    pub fn finalize(&mut self) -> DkgResultT<()> {
        self.require_phase(Phase::Apologizing)?;
        self.phase = Phase::Finalized;
        Ok(())
    }

    /// Dealers that committed and answered every accusation against them.
    pub fn qualified_dealers(&self) -> Vec<KeyperIndex> {
        self.commitments
            .keys()
            .copied()
            .filter(|dealer| {
                self.accusations
                    .iter()
                    .filter(|(_, accused)| accused == dealer)
                    .all(|key| self.apologies.contains(key))
            })
            .collect()
    }

    /// Combine the shares of all qualified dealers.
    pub fn compute_result(&self) -> DkgResultT<DkgResult> {
        self.require_phase(Phase::Finalized)?;

        let qualified = self.qualified_dealers();
        if qualified.is_empty() {
            return Err(DkgError::NoQualifiedDealers);
        }

        let mut secret = Scalar::ZERO;
        let mut public_key = G2Projective::identity();
        let mut public_key_shares = vec![G2Projective::identity(); self.num_keypers as usize];
        for dealer in &qualified {
            let (Some(gammas), Some(eval)) =
                (self.commitments.get(dealer), self.evals.get(dealer))
            else {
                return Err(DkgError::MissingEval { dealer: *dealer });
            };
            if !gammas.verify_eval(self.keyper, eval) {
                return Err(DkgError::MissingEval { dealer: *dealer });
            }
            secret += eval;
            public_key += gammas.constant();
            for (k, share) in public_key_shares.iter_mut().enumerate() {
                *share += gammas.eval_for_keyper(k as u64);
            }
        }

        let secret_key_share = EonSecretKeyShare(secret);
        let public_key_shares: Vec<EonPublicKeyShare> = public_key_shares
            .iter()
            .map(|p| EonPublicKeyShare(p.to_affine()))
            .collect();

        if EonPublicKeyShare::from_secret(&secret_key_share)
            != public_key_shares[self.keyper as usize]
        {
            warn!(eon = self.eon, "secret key share inconsistent with public key shares");
            return Err(DkgError::InconsistentShare);
        }

        Ok(DkgResult {
            eon: self.eon,
            num_keypers: self.num_keypers,
            threshold: self.threshold,
            keyper: self.keyper,
            secret_key_share,
            public_key: EonPublicKey(public_key.to_affine()),
            public_key_shares,
        })
    }
}
