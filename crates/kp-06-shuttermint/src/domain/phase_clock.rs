//! # DKG Phase Clock
//!
//! An eon's DKG phases are counted in consensus heights from the height the
//! eon was started at. Each field of [`PhaseLength`] is the accumulated
//! offset at which the phase *ends*:
//!
//! ```text
//! start      +off       +dealing     +accusing    +apologizing
//!   |   Off   | Dealing  | Accusing   | Apologizing |  Finalized ...
//! ```

use kp_05_dkg::Phase;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseLength {
    pub off: i64,
    pub dealing: i64,
    pub accusing: i64,
    pub apologizing: i64,
}

impl PhaseLength {
    /// Every phase after `Off` lasts `length` heights; `Off` is empty.
    pub fn constant(length: i64) -> Self {
        Self {
            off: 0,
            dealing: length,
            accusing: 2 * length,
            apologizing: 3 * length,
        }
    }

    /// Phase of an eon started at `start_height` when the chain is at
    /// `height`.
    pub fn phase_at(&self, height: i64, start_height: i64) -> Phase {
        let offset = height.saturating_sub(start_height);
        if offset < self.off {
            Phase::Off
        } else if offset < self.dealing {
            Phase::Dealing
        } else if offset < self.accusing {
            Phase::Accusing
        } else if offset < self.apologizing {
            Phase::Apologizing
        } else {
            Phase::Finalized
        }
    }
}
