//! [`MessageSender`] implementations.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use shared_crypto::Secp256k1KeyPair;
use tokio::sync::{mpsc, OnceCell};
use tracing::{info, warn};

use crate::domain::messages::{Message, MessageWithNonce};
use crate::error::{SenderError, SenderResult};
use crate::ports::outbound::{BroadcastResult, MessageSender, ShuttermintClient};

/// `deliver_tx` result codes of the shutter application.
pub mod code {
    pub const OK: u32 = 0;
    pub const ERROR: u32 = 1;
    /// The exact message was delivered before.
    pub const SEEN: u32 = 2;
}

/// Signs messages with the node key and submits them as commit-wait
/// transactions.
pub struct RpcMessageSender {
    client: Arc<dyn ShuttermintClient>,
    signing_key: Secp256k1KeyPair,
    /// Fetched on first send and kept for the lifetime of the process.
    chain_id: OnceCell<String>,
}

impl RpcMessageSender {
    pub fn new(client: Arc<dyn ShuttermintClient>, signing_key: Secp256k1KeyPair) -> Self {
        Self {
            client,
            signing_key,
            chain_id: OnceCell::new(),
        }
    }

    async fn chain_id(&self) -> SenderResult<&str> {
        let chain_id = self
            .chain_id
            .get_or_try_init(|| async { self.client.chain_id().await })
            .await?;
        Ok(chain_id.as_str())
    }
}

impl std::fmt::Debug for RpcMessageSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcMessageSender")
            .field("address", &self.signing_key.address())
            .field("chain_id", &self.chain_id.get())
            .finish()
    }
}

/// Map the node's answer to the outcome of the send.
pub fn classify(result: &BroadcastResult) -> SenderResult<()> {
    if result.check_tx_code != 0 {
        return Err(SenderError::Remote {
            message: format!("checktx: {}", result.check_tx_log),
            retriable: true,
        });
    }
    match result.deliver_tx_code {
        code::OK => Ok(()),
        code::SEEN => {
            warn!(log = %result.deliver_tx_log, "delivertx: message already seen, ignoring");
            Ok(())
        }
        other => Err(SenderError::Remote {
            message: format!("delivertx (code {other}): {}", result.deliver_tx_log),
            retriable: false,
        }),
    }
}

#[async_trait]
impl MessageSender for RpcMessageSender {
    async fn send_message(&self, msg: &Message) -> SenderResult<()> {
        let chain_id = self.chain_id().await?;
        let wrapped = MessageWithNonce::new(msg.clone(), chain_id, rand::random::<u64>());
        let signed = wrapped.sign(&self.signing_key)?;
        let tx = URL_SAFE_NO_PAD.encode(signed).into_bytes();

        let result = self.client.broadcast_tx_commit(tx).await?;
        classify(&result)
    }
}

/// Hands every message to an unbounded channel. Failures can be injected.
#[derive(Debug)]
pub struct MockMessageSender {
    tx: mpsc::UnboundedSender<Message>,
    failures: Mutex<Vec<SenderError>>,
}

impl MockMessageSender {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                failures: Mutex::new(Vec::new()),
            },
            rx,
        )
    }

    /// Fail the next send with `err`. Queued failures are used in order.
    pub fn fail_next(&self, err: SenderError) {
        self.failures.lock().insert(0, err);
    }
}

#[async_trait]
impl MessageSender for MockMessageSender {
    async fn send_message(&self, msg: &Message) -> SenderResult<()> {
        if let Some(err) = self.failures.lock().pop() {
            return Err(err);
        }
        info!(description = %msg.description(), "mock sender: message sent");
        self.tx
            .send(msg.clone())
            .map_err(|_| SenderError::Codec("mock sender receiver dropped".into()))
    }
}
