//! # KP-05 DKG Engine
//!
//! Distributed key generation for one eon and threshold key derivation for
//! the epochs inside it.
//!
//! ## Protocol
//!
//! A synchronous Feldman VSS in four phases driven by consensus heights:
//!
//! | Phase | Local action | Messages consumed |
//! |-------|--------------|-------------------|
//! | Dealing | pick a random polynomial, publish commitments, send evaluations | commitments, evaluations |
//! | Accusing | accuse dealers whose evaluation is missing or invalid | accusations |
//! | Apologizing | answer accusations against us with the evaluation in clear | apologies |
//! | Finalized | sum the shares of all qualified dealers | - |
//!
//! ## Groups
//!
//! - Commitments, the eon public key and its shares live in G2 (96 bytes).
//! - Epoch keys and epoch key shares live in G1 (48 bytes).
//!
//! A share for epoch `e` is `s_i * H(e)`; it verifies against the public key
//! share `P_i = s_i * g2` with `e(share, g2) == e(H(e), P_i)`.
//!
//! ## Crate Structure
//!
//! - `domain/` - polynomial arithmetic, key types, `PureDkg`, `EpochKg`
//! - `testkeygen` - trusted-dealer key material for tests and tooling

pub mod domain;
pub mod error;
pub mod testkeygen;

pub use domain::epochkg::{EpochKg, EpochSecretKeyShareMsg};
pub use domain::keys::{
    compute_epoch_secret_key, compute_epoch_secret_key_share, epoch_point,
    verify_epoch_secret_key, verify_epoch_secret_key_share, EonPublicKey, EonPublicKeyShare,
    EonSecretKeyShare, EpochSecretKey, EpochSecretKeyShare,
};
pub use domain::messages::{AccusationMsg, ApologyMsg, Gammas, PolyCommitmentMsg, PolyEvalMsg};
pub use domain::phase::Phase;
pub use domain::polynomial::{decode_eval, encode_eval, Polynomial};
pub use domain::puredkg::PureDkg;
pub use domain::result::DkgResult;
pub use error::{DkgError, DkgResultT};
