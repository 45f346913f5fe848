//! # Keyper Node Runtime
//!
//! Wires the keyper components together and keeps them running.
//!
//! ## Modules
//!
//! - `container/` - configuration, adapters and task construction
//! - `orchestrator` - the periodic L1/shuttermint loop
//! - `supervisor` - named tasks sharing one shutdown signal
//!
//! ## Startup Sequence
//!
//! 1. Load the TOML configuration and apply environment overrides
//! 2. Open the database and check it belongs to the configured address
//! 3. Load the contract deployments
//! 4. Connect the L1, shuttermint and gossip adapters
//! 5. Spawn every component and wait for the first failure or Ctrl-C

pub mod container;
pub mod error;
pub mod orchestrator;
pub mod supervisor;

pub use container::{link_address, open_database, KeyperConfig, KeyperNode, NodeAdapters};
pub use error::{KeyperError, KeyperResult};
pub use orchestrator::Orchestrator;
pub use supervisor::Supervisor;

use kp_03_event_syncer::Deployments;
use shared_types::ShutdownSignal;
use tracing::info;

/// Run a keyper until Ctrl-C or the first fatal error.
pub async fn run(config: KeyperConfig) -> KeyperResult<()> {
    let db = open_database(&config).await?;
    link_address(&db, config.address()?).await?;

    let deployments = Deployments::load(&config.ethereum.deployment_dir)?;
    let adapters = NodeAdapters::connect(&config).await?;
    let node = KeyperNode::new(config, db, adapters, deployments)?;

    let (signal, _) = ShutdownSignal::new();
    let mut supervisor = Supervisor::new(signal);
    supervisor.spawn_ctrl_c();
    node.spawn(&mut supervisor)?;

    let result = supervisor.join().await;
    info!(ok = result.is_ok(), "[keyper] stopped");
    result
}
