//! # TCP Gossip
//!
//! `TcpGossip` carries [`P2PMessage`]s between keyper processes. A connection
//! is a stream of frames: a big-endian `u32` length followed by the bincode
//! encoded message.
//!
//! A node dials its bootstrap addresses (redialing after every disconnect)
//! and accepts connections on its listen addresses. A frame seen for the
//! first time is delivered to local subscribers and relayed to every other
//! connection, so keypers that only share a bootstrap node still reach each
//! other. Frames are identified by the Keccak-256 of their bytes and repeats
//! are dropped; publishing the same message twice within the dedup window
//! reaches peers once.
//!
//! Relaying checks only the instance id. Topic validators run on each
//! [`Subscription`], the same as for [`InMemoryGossip`](crate::InMemoryGossip).
//!
//! ## Addresses
//!
//! | Form | Example |
//! |------|---------|
//! | `host:port` | `10.0.0.5:23000` |
//! | `/ip4/<ip>/tcp/<port>` | `/ip4/0.0.0.0/tcp/23000` |
//! | `/ip6/<ip>/tcp/<port>` | `/ip6/::1/tcp/23000` |
//! | `/dns4/<host>/tcp/<port>` | `/dns4/keyper-0/tcp/23000` |
//!
//! Trailing multiaddr components such as `/p2p/<peer id>` are ignored.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_crypto::keccak256;
use shared_types::{Hash, InstanceId, Shutdown, ShutdownSignal};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{BusError, BusResult};
use crate::messages::{P2PMessage, Topic};
use crate::publisher::{Frame, GossipNetwork, Messaging};
use crate::subscriber::Subscription;
use crate::validator::{MessageValidator, ValidatorRegistry};
use crate::DEFAULT_CHANNEL_CAPACITY;

/// Pause after a failed `accept` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct TcpGossipConfig {
    pub listen_addresses: Vec<String>,
    pub bootstrap_addresses: Vec<String>,
    /// Messages buffered per local subscriber and per connection.
    pub capacity: usize,
    pub max_frame_size: usize,
    pub connect_timeout: Duration,
    /// Wait between dial attempts to a bootstrap address.
    pub redial_interval: Duration,
    /// Frame hashes remembered for deduplication.
    pub seen_capacity: usize,
}

impl Default for TcpGossipConfig {
    fn default() -> Self {
        Self {
            listen_addresses: Vec::new(),
            bootstrap_addresses: Vec::new(),
            capacity: DEFAULT_CHANNEL_CAPACITY,
            max_frame_size: 1 << 20,
            connect_timeout: Duration::from_secs(5),
            redial_interval: Duration::from_secs(5),
            seen_capacity: 8192,
        }
    }
}

/// Turn a configured peer address into a `host:port` string that
/// `TcpStream::connect` and `TcpListener::bind` accept.
pub fn parse_peer_address(addr: &str) -> BusResult<String> {
    let invalid = || BusError::InvalidAddress(addr.to_string());

    if !addr.starts_with('/') {
        let valid = addr
            .rsplit_once(':')
            .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
        return if valid { Ok(addr.to_string()) } else { Err(invalid()) };
    }

    let parts: Vec<&str> = addr.split('/').skip(1).collect();
    let [proto, host, "tcp", port, ..] = parts.as_slice() else {
        return Err(invalid());
    };
    let port: u16 = port.parse().map_err(|_| invalid())?;
    match *proto {
        "ip4" => {
            let ip: Ipv4Addr = host.parse().map_err(|_| invalid())?;
            Ok(SocketAddr::from((ip, port)).to_string())
        }
        "ip6" => {
            let ip: Ipv6Addr = host.parse().map_err(|_| invalid())?;
            Ok(SocketAddr::from((ip, port)).to_string())
        }
        "dns" | "dns4" | "dns6" if !host.is_empty() => Ok(format!("{host}:{port}")),
        _ => Err(invalid()),
    }
}

/// Bounded set of recently seen frame hashes, oldest evicted first.
struct SeenCache {
    capacity: usize,
    order: VecDeque<Hash>,
    set: HashSet<Hash>,
}

impl SeenCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            set: HashSet::new(),
        }
    }

    /// False if `hash` is already known.
    fn insert(&mut self, hash: Hash) -> bool {
        if !self.set.insert(hash) {
            return false;
        }
        self.order.push_back(hash);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.set.remove(&oldest);
            }
        }
        true
    }
}

/// State shared by the endpoint and its connection tasks.
struct Shared {
    instance_id: InstanceId,
    local: GossipNetwork,
    max_frame_size: usize,
    queue_capacity: usize,
    peers: Mutex<HashMap<u64, mpsc::Sender<Arc<Vec<u8>>>>>,
    seen: Mutex<SeenCache>,
}

impl Shared {
    /// Queue `data` on every connection except `skip`. Returns how many
    /// connections took it.
    fn broadcast(&self, data: &Arc<Vec<u8>>, skip: Option<u64>) -> usize {
        let mut queued = 0;
        self.peers.lock().retain(|conn, tx| {
            if Some(*conn) == skip {
                return true;
            }
            match tx.try_send(Arc::clone(data)) {
                Ok(()) => {
                    queued += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(conn = *conn, "[p2p] peer queue full, frame dropped");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
        queued
    }

    /// Handle a frame read from connection `conn`.
    fn receive(&self, conn: u64, data: Vec<u8>) {
        if !self.seen.lock().insert(keccak256(&data)) {
            return;
        }
        let msg = match P2PMessage::decode(&data) {
            Ok(msg) => msg,
            Err(err) => {
                warn!(conn, %err, "[p2p] undecodable frame");
                return;
            }
        };
        if msg.instance_id() != self.instance_id {
            debug!(
                conn,
                got = msg.instance_id(),
                expected = self.instance_id,
                "[p2p] not relaying message of foreign instance"
            );
            return;
        }

        let data = Arc::new(data);
        self.broadcast(&data, Some(conn));
        if self.local.sender.send(Frame { from: conn, data }).is_err() {
            debug!(conn, topic = %msg.topic(), "[p2p] no local subscribers");
        }
    }

    async fn run_connection(self: Arc<Self>, stream: TcpStream, remote: String, shutdown: Shutdown) {
        let conn = self.local.allocate_peer();
        if let Err(err) = stream.set_nodelay(true) {
            debug!(conn, %err, "[p2p] cannot set TCP_NODELAY");
        }
        let (mut reader, mut writer) = stream.into_split();
        let (tx, mut rx) = mpsc::channel::<Arc<Vec<u8>>>(self.queue_capacity);
        self.peers.lock().insert(conn, tx);
        info!(conn, remote = %remote, "[p2p] peer connected");

        let write_task = tokio::spawn(async move {
            while let Some(data) = rx.recv().await {
                if let Err(err) = write_frame(&mut writer, &data).await {
                    debug!(conn, %err, "[p2p] write failed");
                    break;
                }
            }
        });

        loop {
            let read = tokio::select! {
                _ = shutdown.wait() => break,
                read = read_frame(&mut reader, self.max_frame_size) => read,
            };
            match read {
                Ok(Some(data)) => self.receive(conn, data),
                Ok(None) => break,
                Err(err) => {
                    warn!(conn, remote = %remote, %err, "[p2p] dropping connection");
                    break;
                }
            }
        }

        self.peers.lock().remove(&conn);
        write_task.abort();
        info!(conn, remote = %remote, "[p2p] peer disconnected");
    }
}

async fn accept_loop(shared: Arc<Shared>, listener: TcpListener, shutdown: Shutdown) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.wait() => return,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, remote)) => {
                tokio::spawn(Arc::clone(&shared).run_connection(
                    stream,
                    remote.to_string(),
                    shutdown.clone(),
                ));
            }
            Err(err) => {
                warn!(%err, "[p2p] accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

async fn dial_loop(
    shared: Arc<Shared>,
    address: String,
    connect_timeout: Duration,
    redial_interval: Duration,
    shutdown: Shutdown,
) {
    while !shutdown.is_triggered() {
        match tokio::time::timeout(connect_timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => {
                Arc::clone(&shared)
                    .run_connection(stream, address.clone(), shutdown.clone())
                    .await;
            }
            Ok(Err(err)) => debug!(address = %address, %err, "[p2p] dial failed"),
            Err(_) => debug!(address = %address, "[p2p] dial timed out"),
        }
        tokio::select! {
            _ = shutdown.wait() => return,
            _ = tokio::time::sleep(redial_interval) => {}
        }
    }
}

/// Read one frame. `Ok(None)` when the stream ends between frames.
pub(crate) async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_frame_size: usize,
) -> BusResult<Option<Vec<u8>>> {
    let mut len = [0u8; 4];
    match reader.read_exact(&mut len).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(BusError::Transport(err.to_string())),
    }
    let size = u32::from_be_bytes(len) as usize;
    if size > max_frame_size {
        return Err(BusError::FrameTooLarge {
            size,
            max: max_frame_size,
        });
    }
    let mut data = vec![0u8; size];
    reader
        .read_exact(&mut data)
        .await
        .map_err(|e| BusError::Transport(e.to_string()))?;
    Ok(Some(data))
}

pub(crate) async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, data: &[u8]) -> BusResult<()> {
    let len = u32::try_from(data.len()).map_err(|_| BusError::FrameTooLarge {
        size: data.len(),
        max: u32::MAX as usize,
    })?;
    let transport = |e: std::io::Error| BusError::Transport(e.to_string());
    writer.write_all(&len.to_be_bytes()).await.map_err(transport)?;
    writer.write_all(data).await.map_err(transport)?;
    writer.flush().await.map_err(transport)
}

/// Gossip endpoint speaking to other processes over TCP.
///
/// Background tasks stop when the endpoint is dropped.
pub struct TcpGossip {
    peer: u64,
    shared: Arc<Shared>,
    validators: Arc<ValidatorRegistry>,
    local_addrs: Vec<SocketAddr>,
    signal: ShutdownSignal,
    messages_sent: AtomicU64,
}

impl TcpGossip {
    /// Bind every listen address and start dialing the bootstrap peers.
    pub async fn start(config: TcpGossipConfig, instance_id: InstanceId) -> BusResult<Self> {
        let bootstrap = config
            .bootstrap_addresses
            .iter()
            .map(|addr| parse_peer_address(addr))
            .collect::<BusResult<Vec<_>>>()?;

        let local = GossipNetwork::with_capacity(config.capacity);
        let peer = local.allocate_peer();
        let shared = Arc::new(Shared {
            instance_id,
            local,
            max_frame_size: config.max_frame_size,
            queue_capacity: config.capacity.max(1),
            peers: Mutex::new(HashMap::new()),
            seen: Mutex::new(SeenCache::new(config.seen_capacity)),
        });
        let (signal, shutdown) = ShutdownSignal::new();

        let mut listeners = Vec::new();
        for addr in &config.listen_addresses {
            let addr = parse_peer_address(addr)?;
            let listener = TcpListener::bind(&addr)
                .await
                .map_err(|e| BusError::Transport(format!("cannot listen on {addr}: {e}")))?;
            let bound = listener
                .local_addr()
                .map_err(|e| BusError::Transport(e.to_string()))?;
            listeners.push((listener, bound));
        }

        let mut local_addrs = Vec::new();
        for (listener, bound) in listeners {
            info!(address = %bound, "[p2p] listening");
            local_addrs.push(bound);
            tokio::spawn(accept_loop(Arc::clone(&shared), listener, shutdown.clone()));
        }
        for address in bootstrap {
            info!(address = %address, "[p2p] dialing bootstrap peer");
            tokio::spawn(dial_loop(
                Arc::clone(&shared),
                address,
                config.connect_timeout,
                config.redial_interval,
                shutdown.clone(),
            ));
        }

        Ok(Self {
            peer,
            shared,
            validators: Arc::new(ValidatorRegistry::new(instance_id)),
            local_addrs,
            signal,
            messages_sent: AtomicU64::new(0),
        })
    }

    /// Addresses actually bound, with ephemeral ports resolved.
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.local_addrs
    }

    /// Open connections, inbound and outbound.
    pub fn peer_count(&self) -> usize {
        self.shared.peers.lock().len()
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }
}

impl Drop for TcpGossip {
    fn drop(&mut self) {
        self.signal.trigger();
    }
}

impl std::fmt::Debug for TcpGossip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpGossip")
            .field("instance_id", &self.shared.instance_id)
            .field("local_addrs", &self.local_addrs)
            .field("peers", &self.peer_count())
            .finish()
    }
}

#[async_trait]
impl Messaging for TcpGossip {
    async fn send(&self, msg: P2PMessage) -> BusResult<()> {
        let data = msg.encode()?;
        if data.len() > self.shared.max_frame_size {
            return Err(BusError::FrameTooLarge {
                size: data.len(),
                max: self.shared.max_frame_size,
            });
        }
        self.shared.seen.lock().insert(keccak256(&data));
        let peers = self.shared.broadcast(&Arc::new(data), None);
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        debug!(topic = %msg.topic(), msg = %msg.log_info(), peers, "[p2p] publishing");
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        Subscription::new(
            self.shared.local.sender.subscribe(),
            self.peer,
            self.validators.clone(),
        )
    }

    fn add_validator(&self, topic: Topic, validator: Arc<dyn MessageValidator>) {
        self.validators.add_validator(topic, validator);
    }
}
