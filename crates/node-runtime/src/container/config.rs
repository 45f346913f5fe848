//! # Keyper Configuration
//!
//! TOML file with one section per collaborator:
//!
//! ```toml
//! instance_id = 42
//! database_url = "rocksdb:///var/lib/keyper"
//! http_enabled = true
//! http_listen_address = "127.0.0.1:3000"
//! enable_write_operations = false
//!
//! [p2p]
//! transport = "tcp"
//! listen_addresses = ["/ip4/0.0.0.0/tcp/23000"]
//! bootstrap_addresses = ["/dns4/keyper-0/tcp/23000"]
//!
//! [ethereum]
//! url = "http://localhost:8545"
//! private_key = "…"
//! deployment_dir = "./deployments/localhost"
//!
//! [shuttermint]
//! url = "http://localhost:26657"
//! validator_public_key = "…"
//! encryption_key = "…"
//! dkg_phase_length = 30
//! dkg_start_block_delta = 200
//!
//! [metrics]
//! enabled = true
//! port = 9100
//! ```
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `KEYPER_DATABASE_URL` | `database_url` |
//! | `KEYPER_HTTP_LISTEN_ADDRESS` | `http_listen_address` |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared_bus::{parse_peer_address, TcpGossipConfig};
use shared_crypto::{EncryptionKeyPair, Secp256k1KeyPair, ValidatorPublicKey};
use shared_types::{Address, InstanceId};

use crate::error::{KeyperError, KeyperResult};

const MEMORY_SCHEME: &str = "memory://";
const ROCKSDB_SCHEME: &str = "rocksdb://";

/// Complete keyper configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeyperConfig {
    /// Network-wide id. Every gossip message carries it.
    pub instance_id: InstanceId,
    pub database_url: String,
    pub http_enabled: bool,
    pub http_listen_address: SocketAddr,
    pub enable_write_operations: bool,
    pub p2p: P2pConfig,
    pub ethereum: EthereumConfig,
    pub shuttermint: ShuttermintConfig,
    pub metrics: MetricsConfig,
}

/// How gossip leaves the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GossipTransport {
    /// Length-prefixed frames over TCP to the configured peers.
    Tcp,
    /// In-process bus; the keyper talks to nobody else.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct P2pConfig {
    pub transport: GossipTransport,
    pub listen_addresses: Vec<String>,
    pub bootstrap_addresses: Vec<String>,
    /// Messages buffered per subscriber before slow peers lag.
    pub gossip_capacity: usize,
    pub max_message_size: usize,
    /// Wait between dial attempts to a bootstrap peer.
    pub redial_interval_secs: u64,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            transport: GossipTransport::Tcp,
            listen_addresses: vec!["/ip4/0.0.0.0/tcp/23000".to_string()],
            bootstrap_addresses: Vec::new(),
            gossip_capacity: 1024,
            max_message_size: 1 << 20,
            redial_interval_secs: 5,
        }
    }
}

impl P2pConfig {
    pub fn validate(&self) -> KeyperResult<()> {
        if self.transport == GossipTransport::Memory {
            return Ok(());
        }
        if self.listen_addresses.is_empty() && self.bootstrap_addresses.is_empty() {
            return Err(KeyperError::Config(
                "p2p: tcp transport needs a listen or bootstrap address".into(),
            ));
        }
        for addr in self.listen_addresses.iter().chain(&self.bootstrap_addresses) {
            parse_peer_address(addr).map_err(|e| KeyperError::Config(format!("p2p: {e}")))?;
        }
        Ok(())
    }

    pub fn tcp_gossip_config(&self) -> TcpGossipConfig {
        TcpGossipConfig {
            listen_addresses: self.listen_addresses.clone(),
            bootstrap_addresses: self.bootstrap_addresses.clone(),
            capacity: self.gossip_capacity,
            max_frame_size: self.max_message_size,
            redial_interval: Duration::from_secs(self.redial_interval_secs),
            ..TcpGossipConfig::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EthereumConfig {
    /// JSON-RPC endpoint polled for the head block.
    pub url: String,
    /// Hex secp256k1 key; its address is the keyper identity.
    pub private_key: String,
    pub deployment_dir: PathBuf,
    /// Endpoint for contract logs and calls. Empty means `url`.
    pub contracts_url: String,
    pub request_timeout_secs: u64,
}

impl Default for EthereumConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8545".to_string(),
            private_key: String::new(),
            deployment_dir: PathBuf::from("./deployments/localhost"),
            contracts_url: String::new(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShuttermintConfig {
    pub url: String,
    /// Hex Ed25519 key of the validator this keyper runs alongside.
    pub validator_public_key: String,
    /// Hex secret of the key poly evals are encrypted to.
    pub encryption_key: String,
    /// Consensus heights per DKG phase.
    pub dkg_phase_length: i64,
    /// L1 blocks before activation at which a new keyper set is proposed.
    pub dkg_start_block_delta: u64,
    pub request_timeout_secs: u64,
}

impl Default for ShuttermintConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:26657".to_string(),
            validator_public_key: String::new(),
            encryption_key: String::new(),
            dkg_phase_length: 30,
            dkg_start_block_delta: 200,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub host: IpAddr,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 9100,
        }
    }
}

impl MetricsConfig {
    pub fn listen_address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for KeyperConfig {
    fn default() -> Self {
        Self {
            instance_id: 0,
            database_url: MEMORY_SCHEME.to_string(),
            http_enabled: false,
            http_listen_address: SocketAddr::from((Ipv4Addr::LOCALHOST, 3000)),
            enable_write_operations: false,
            p2p: P2pConfig::default(),
            ethereum: EthereumConfig::default(),
            shuttermint: ShuttermintConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Backend selected by `database_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    RocksDb(PathBuf),
}

impl KeyperConfig {
    /// Read, apply environment overrides and validate.
    pub fn load(path: &Path) -> KeyperResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| KeyperError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config = Self::from_toml(&text)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> KeyperResult<Self> {
        toml::from_str(text).map_err(|e| KeyperError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> KeyperResult<String> {
        toml::to_string_pretty(self).map_err(|e| KeyperError::Config(e.to_string()))
    }

    /// A fresh configuration with newly generated keys.
    pub fn generate(instance_id: InstanceId) -> Self {
        let validator = ed25519_dalek::SigningKey::from_bytes(&rand::random::<[u8; 32]>());
        Self {
            instance_id,
            ethereum: EthereumConfig {
                private_key: Secp256k1KeyPair::generate().to_hex(),
                ..EthereumConfig::default()
            },
            shuttermint: ShuttermintConfig {
                validator_public_key: hex::encode(validator.verifying_key().to_bytes()),
                encryption_key: EncryptionKeyPair::generate().to_hex(),
                ..ShuttermintConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn apply_env_overrides(&mut self) -> KeyperResult<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> KeyperResult<()> {
        if let Some(url) = lookup("KEYPER_DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(address) = lookup("KEYPER_HTTP_LISTEN_ADDRESS") {
            self.http_listen_address = address.parse().map_err(|e| {
                KeyperError::Config(format!("KEYPER_HTTP_LISTEN_ADDRESS {address:?}: {e}"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> KeyperResult<()> {
        if self.instance_id == 0 {
            return Err(KeyperError::Config("instance_id must be set".into()));
        }
        if self.shuttermint.dkg_phase_length <= 0 {
            return Err(KeyperError::Config(
                "shuttermint.dkg_phase_length must be positive".into(),
            ));
        }
        self.signing_key()?;
        self.validator_public_key()?;
        self.encryption_key()?;
        self.storage_backend()?;
        self.p2p.validate()?;
        Ok(())
    }

    pub fn signing_key(&self) -> KeyperResult<Secp256k1KeyPair> {
        Secp256k1KeyPair::from_hex(&self.ethereum.private_key)
            .map_err(|e| KeyperError::Config(format!("ethereum.private_key: {e}")))
    }

    pub fn address(&self) -> KeyperResult<Address> {
        Ok(self.signing_key()?.address())
    }

    pub fn validator_public_key(&self) -> KeyperResult<ValidatorPublicKey> {
        ValidatorPublicKey::from_hex(&self.shuttermint.validator_public_key)
            .map_err(|e| KeyperError::Config(format!("shuttermint.validator_public_key: {e}")))
    }

    pub fn encryption_key(&self) -> KeyperResult<EncryptionKeyPair> {
        EncryptionKeyPair::from_hex(&self.shuttermint.encryption_key)
            .map_err(|e| KeyperError::Config(format!("shuttermint.encryption_key: {e}")))
    }

    pub fn contracts_url(&self) -> &str {
        if self.ethereum.contracts_url.is_empty() {
            &self.ethereum.url
        } else {
            &self.ethereum.contracts_url
        }
    }

    pub fn storage_backend(&self) -> KeyperResult<StorageBackend> {
        let url = self.database_url.as_str();
        if url == MEMORY_SCHEME {
            Ok(StorageBackend::Memory)
        } else if let Some(path) = url.strip_prefix(ROCKSDB_SCHEME).filter(|p| !p.is_empty()) {
            Ok(StorageBackend::RocksDb(PathBuf::from(path)))
        } else {
            Err(KeyperError::Config(format!(
                "unsupported database_url {url:?}, expected {MEMORY_SCHEME} or {ROCKSDB_SCHEME}<path>"
            )))
        }
    }
}
