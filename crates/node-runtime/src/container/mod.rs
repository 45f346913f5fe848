//! # Keyper Container
//!
//! Builds every component from a [`KeyperConfig`] and hands them to the
//! [`Supervisor`] as named tasks.
//!
//! ```text
//!   L1 contracts ──▶ chain-observer ──┐
//!                                     ▼
//!   L1 head ──▶ orchestrator ◀────▶ database ◀── eon-publisher ──▶ gossip
//!                  │    ▲              ▲
//!       shuttermint ◀┘    └─ driver      └── epoch-keys ◀──▶ gossip
//!                                               ▲
//!                                     http ─────┘ (triggers)
//! ```
//!
//! | Task | Runs when |
//! |------|-----------|
//! | `chain-observer` | always |
//! | `orchestrator` | always |
//! | `eon-publisher` | always |
//! | `epoch-keys` | always |
//! | `http` | `http_enabled` |
//! | `metrics` | `metrics.enabled` |

pub mod config;

pub use config::{
    EthereumConfig, GossipTransport, KeyperConfig, MetricsConfig, P2pConfig, ShuttermintConfig,
    StorageBackend,
};

use std::sync::Arc;
use std::time::Duration;

use keyper_telemetry::KeyperMetrics;
use kp_02_storage::Database;
use kp_03_event_syncer::{Contracts, Deployments, EthereumClient, RpcEthereumClient};
use kp_04_chain_observer::{ChainObserver, CollatorHandler, KeyperSetHandler};
use kp_06_shuttermint::{
    MessageSender, PhaseLength, RpcMessageSender, RpcShuttermintClient, ShuttermintClient,
    ShuttermintDriver, ShuttermintState, StateConfig,
};
use kp_07_epoch_keys::{trigger_channel, EpochKeyHandler, EpochKeyService, TRIGGER_QUEUE_CAPACITY};
use kp_08_eon_publisher::EonKeyPublisher;
use kp_09_api_gateway::{build_metrics_router, serve, ApiConfig, ApiServer, AppState, GatewayError};
use prometheus::Registry;
use shared_bus::{GossipNetwork, InMemoryGossip, Messaging, TcpGossip};
use shared_types::{Address, Clock, SystemClock};
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::error::{KeyperError, KeyperResult};
use crate::orchestrator::Orchestrator;
use crate::supervisor::Supervisor;

/// Meta key that ties a database to one keyper address.
pub const ADDRESS_META_KEY: &str = "ethereum address";

/// Everything the node talks to.
pub struct NodeAdapters {
    /// Source of the L1 head.
    pub ethereum: Arc<dyn EthereumClient>,
    /// Client the contract bindings and the chain observer use.
    pub contracts: Arc<dyn EthereumClient>,
    pub shuttermint: Arc<dyn ShuttermintClient>,
    pub messaging: Arc<dyn Messaging>,
    pub clock: Arc<dyn Clock>,
}

impl NodeAdapters {
    /// Production adapters. Gossip uses the transport `p2p.transport` names.
    pub async fn connect(config: &KeyperConfig) -> KeyperResult<Self> {
        let timeout = Duration::from_secs(config.ethereum.request_timeout_secs);
        let ethereum: Arc<dyn EthereumClient> =
            Arc::new(RpcEthereumClient::new(&config.ethereum.url, timeout)?);
        let contracts: Arc<dyn EthereumClient> = if config.contracts_url() == config.ethereum.url {
            Arc::clone(&ethereum)
        } else {
            Arc::new(RpcEthereumClient::new(config.contracts_url(), timeout)?)
        };
        let shuttermint = Arc::new(RpcShuttermintClient::new(
            &config.shuttermint.url,
            Duration::from_secs(config.shuttermint.request_timeout_secs),
        )?);

        let messaging = connect_gossip(config).await?;

        Ok(Self {
            ethereum,
            contracts,
            shuttermint,
            messaging,
            clock: Arc::new(SystemClock),
        })
    }
}

/// Gossip endpoint for `config.p2p`.
pub async fn connect_gossip(config: &KeyperConfig) -> KeyperResult<Arc<dyn Messaging>> {
    match config.p2p.transport {
        GossipTransport::Tcp => {
            let gossip =
                TcpGossip::start(config.p2p.tcp_gossip_config(), config.instance_id).await?;
            info!(
                listen = ?gossip.local_addrs(),
                bootstrap = ?config.p2p.bootstrap_addresses,
                "[p2p] tcp gossip started"
            );
            Ok(Arc::new(gossip))
        }
        GossipTransport::Memory => {
            warn!("[p2p] in-process gossip, no other keyper will hear this node");
            let network = GossipNetwork::with_capacity(config.p2p.gossip_capacity);
            Ok(Arc::new(InMemoryGossip::join(&network, config.instance_id)))
        }
    }
}

/// Open the configured store and bring its schema up to date.
pub async fn open_database(config: &KeyperConfig) -> KeyperResult<Database> {
    let db = match config.storage_backend()? {
        StorageBackend::Memory => {
            warn!("[storage] using in-memory database, state is lost on exit");
            Database::in_memory()
        }
        #[cfg(feature = "rocksdb")]
        StorageBackend::RocksDb(path) => {
            info!(path = %path.display(), "[storage] opening rocksdb");
            Database::new(kp_02_storage::RocksDbStore::open_default(&path)?)
        }
        #[cfg(not(feature = "rocksdb"))]
        StorageBackend::RocksDb(path) => {
            return Err(KeyperError::Config(format!(
                "database {} requires the rocksdb feature",
                path.display()
            )))
        }
    };
    db.initialize().await?;
    Ok(db)
}

/// Record `address` as the owner of `db`, or check it against the owner
/// recorded earlier.
pub async fn link_address(db: &Database, address: Address) -> KeyperResult<()> {
    let mut tx = db.begin().await;
    let configured = address.to_string();
    match tx.get_meta(ADDRESS_META_KEY)? {
        Some(stored) if stored == configured => Ok(()),
        Some(stored) => Err(KeyperError::AddressMismatch { stored, configured }),
        None => {
            tx.insert_meta(ADDRESS_META_KEY, &configured)?;
            tx.commit()?;
            info!(address = %configured, "[storage] linked database to keyper address");
            Ok(())
        }
    }
}

/// A fully built keyper, ready to be spawned.
pub struct KeyperNode {
    config: KeyperConfig,
    db: Database,
    adapters: NodeAdapters,
    contracts: Contracts,
    registry: Registry,
    metrics: KeyperMetrics,
}

impl KeyperNode {
    pub fn new(
        config: KeyperConfig,
        db: Database,
        adapters: NodeAdapters,
        deployments: Deployments,
    ) -> KeyperResult<Self> {
        let contracts = Contracts::new(Arc::clone(&adapters.contracts), deployments)?;
        let registry = Registry::new();
        let metrics = KeyperMetrics::new(&registry)?;
        Ok(Self {
            config,
            db,
            adapters,
            contracts,
            registry,
            metrics,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Start every component under `supervisor`.
    #[instrument(name = "keyper_spawn", skip_all, fields(instance_id = self.config.instance_id))]
    pub fn spawn(self, supervisor: &mut Supervisor) -> KeyperResult<()> {
        let Self {
            config,
            db,
            adapters,
            contracts,
            registry,
            metrics,
        } = self;
        let signing_key = config.signing_key()?;
        let address = signing_key.address();
        info!(%address, "[keyper] starting");

        // Chain observer: keyper and collator configs from L1.
        let observer = ChainObserver::new(Arc::clone(&adapters.contracts), db.clone())
            .register_event(
                contracts.keypers_configs_list_new_config(),
                Arc::new(KeyperSetHandler::new(contracts.keypers.clone())),
            )
            .register_event(
                contracts.collator_configs_list_new_config(),
                Arc::new(CollatorHandler::new(contracts.collators.clone())),
            )
            .with_metrics(metrics.clone());
        let shutdown = supervisor.shutdown();
        supervisor.spawn("chain-observer", async move {
            observer.run(&shutdown).await.map_err(KeyperError::from)
        });

        // Orchestrator: shuttermint sync, batch configs and the outbound queue.
        let state = ShuttermintState::new(
            StateConfig {
                address,
                validator_public_key: config.validator_public_key()?,
                encryption_key: config.encryption_key()?,
                phase_length: PhaseLength::constant(config.shuttermint.dkg_phase_length),
            },
            Arc::clone(&adapters.clock),
        )
        .with_metrics(metrics.clone());
        let driver = ShuttermintDriver::new(
            Arc::clone(&adapters.shuttermint),
            db.clone(),
            state,
            Arc::clone(&adapters.clock),
        )
        .with_metrics(metrics.clone());
        let sender: Arc<dyn MessageSender> = Arc::new(RpcMessageSender::new(
            Arc::clone(&adapters.shuttermint),
            signing_key.clone(),
        ));
        let orchestrator = Orchestrator::new(
            db.clone(),
            Arc::clone(&adapters.ethereum),
            driver,
            sender,
            Arc::clone(&adapters.clock),
            address,
            config.shuttermint.dkg_start_block_delta,
        )
        .with_metrics(metrics.clone());
        let shutdown = supervisor.shutdown();
        supervisor.spawn("orchestrator", async move { orchestrator.run(&shutdown).await });

        // Eon public keys onto gossip.
        let publisher = EonKeyPublisher::new(
            db.clone(),
            Arc::clone(&adapters.messaging),
            Arc::new(signing_key),
            config.instance_id,
        )
        .with_metrics(metrics.clone());
        let shutdown = supervisor.shutdown();
        supervisor.spawn("eon-publisher", async move {
            publisher.run(&shutdown).await.map_err(KeyperError::from)
        });

        // Decryption triggers, key shares and keys.
        let handler = Arc::new(
            EpochKeyHandler::new(db.clone(), config.instance_id, address)
                .with_metrics(metrics.clone()),
        );
        let (triggers, receiver) = trigger_channel(TRIGGER_QUEUE_CAPACITY);
        let service = EpochKeyService::new(handler, Arc::clone(&adapters.messaging), receiver);
        let shutdown = supervisor.shutdown();
        supervisor.spawn("epoch-keys", async move {
            service.run(&shutdown).await.map_err(KeyperError::from)
        });

        if config.http_enabled {
            let api_config = ApiConfig {
                listen_address: config.http_listen_address,
                enable_write_operations: config.enable_write_operations,
            };
            let state = AppState {
                db: db.clone(),
                triggers: Arc::new(triggers),
                instance_id: config.instance_id,
                registry: registry.clone(),
                enable_write_operations: config.enable_write_operations,
            };
            let server = ApiServer::new(api_config, state);
            let shutdown = supervisor.shutdown();
            supervisor.spawn("http", async move {
                server.run(&shutdown).await.map_err(KeyperError::from)
            });
        }

        if config.metrics.enabled {
            let listen_address = config.metrics.listen_address();
            let router = build_metrics_router(registry);
            let shutdown = supervisor.shutdown();
            supervisor.spawn("metrics", async move {
                let listener = TcpListener::bind(listen_address)
                    .await
                    .map_err(GatewayError::Bind)?;
                info!(address = %listen_address, "[metrics] serving");
                serve(listener, router, &shutdown).await?;
                Ok(())
            });
        }

        Ok(())
    }
}
