//! Pure DKG and epoch key logic. No I/O.

pub mod epochkg;
pub mod keys;
pub mod messages;
pub mod phase;
pub mod polynomial;
pub mod puredkg;
pub mod result;
pub mod serde_bls;
