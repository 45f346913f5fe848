//! Gossip errors.

use thiserror::Error;

use crate::messages::Topic;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The bus was dropped.
    #[error("gossip bus closed")]
    Closed,

    #[error("no handler for topic {0}")]
    NoHandler(Topic),

    #[error("gossip codec error: {0}")]
    Codec(String),

    /// Socket failure on a gossip connection.
    #[error("gossip transport error: {0}")]
    Transport(String),

    #[error("invalid peer address {0:?}")]
    InvalidAddress(String),

    #[error("gossip frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// A handler failed while processing a valid message.
    #[error("handler for {topic} failed: {message}")]
    Handler { topic: Topic, message: String },
}

pub type BusResult<T> = Result<T, BusError>;
