//! # KP-06 Shuttermint
//!
//! The keyper's view of the BFT consensus chain ("shuttermint").
//!
//! ```text
//!                 tx_search                       handle_event
//! BFT node ──────────────────► ShuttermintDriver ─────────────► ShuttermintState
//!    ▲                                                              │
//!    │ broadcast_tx_commit                      schedule message    │
//!    └──── RpcMessageSender ◄── send_shutter_messages ◄── outbound queue
//! ```
//!
//! ## Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`ShuttermintDriver`] | windowed sync, one DB transaction per window |
//! | [`ShuttermintState`] | event reducer, owns running DKGs |
//! | [`PhaseLength`] | maps heights to DKG phases |
//! | [`send_shutter_messages`] | flushes the outbound queue |
//! | [`RpcMessageSender`] | signs and broadcasts one message |
//!
//! Events and messages are never exchanged directly: the reducer only
//! writes to the outbound queue and the sender only reads from it.

pub mod adapters;
pub mod domain;
pub mod driver;
pub mod error;
pub mod ports;
pub mod sender;

pub use adapters::mock::{message_to_event, MockShuttermintClient};
pub use adapters::rpc::RpcShuttermintClient;
pub use adapters::sender::{classify, code, MockMessageSender, RpcMessageSender};
pub use domain::events::{
    AbciEvent, Accusation, Apology, BatchConfig, BatchConfigStarted, CheckIn, EonStarted, Event,
    EventAttribute, PolyCommitment, PolyEval,
};
pub use domain::messages::{batch_config_description, Message, MessageWithNonce};
pub use domain::phase_clock::PhaseLength;
pub use domain::state::{ShuttermintState, StateConfig};
pub use driver::{ShuttermintDriver, PER_PAGE, PER_QUERY};
pub use error::{
    ClientError, ClientResult, DriverError, DriverResult, SenderError, SenderResult,
};
pub use ports::outbound::{
    BroadcastResult, MessageSender, ShuttermintClient, TxQuery, TxResult, TxSearchPage,
};
pub use sender::send_shutter_messages;
