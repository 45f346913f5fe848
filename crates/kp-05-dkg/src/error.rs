//! DKG errors.

use thiserror::Error;

use crate::domain::phase::Phase;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DkgError {
    #[error("operation requires phase {expected}, current phase is {actual}")]
    WrongPhase { expected: Phase, actual: Phase },

    #[error("keyper index {index} out of range for {num_keypers} keypers")]
    InvalidIndex { index: u64, num_keypers: u64 },

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("duplicate {kind} from keyper {sender}")]
    Duplicate { kind: &'static str, sender: u64 },

    #[error("commitment from keyper {sender} has {actual} gammas, expected {expected}")]
    InvalidCommitment {
        sender: u64,
        expected: usize,
        actual: usize,
    },

    #[error("poly eval not addressed to this keyper (receiver {receiver})")]
    WrongReceiver { receiver: u64 },

    #[error("apology for unknown accusation ({accuser} -> {accused})")]
    UnknownAccusation { accuser: u64, accused: u64 },

    #[error("apology from keyper {accused} to {accuser} does not match commitment")]
    InvalidApology { accuser: u64, accused: u64 },

    #[error("no qualified dealers")]
    NoQualifiedDealers,

    #[error("missing valid poly eval from qualified dealer {dealer}")]
    MissingEval { dealer: u64 },

    #[error("computed secret key share does not match public key share")]
    InconsistentShare,

    #[error("need {need} epoch secret key shares, have {have}")]
    NotEnoughShares { have: usize, need: usize },

    #[error("duplicate keyper index {0} in share set")]
    DuplicateShareIndex(u64),

    #[error("epoch secret key share from keyper {sender} does not verify")]
    InvalidShare { sender: u64 },

    #[error("codec error: {0}")]
    Codec(String),
}

pub type DkgResultT<T> = Result<T, DkgError>;
