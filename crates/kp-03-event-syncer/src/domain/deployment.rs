//! # Contract Deployments
//!
//! A deployment directory (as written by hardhat-deploy) holds one
//! `<Name>.json` per contract plus a `.chainId` file with the decimal chain
//! id. Only the address, the ABI entry names and the deploy block are read.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use shared_types::{Address, BlockNumber};
use tracing::debug;

use crate::error::{SyncerError, SyncerResult};

const CHAIN_ID_FILE_NAME: &str = ".chainId";

/// ABI entry, reduced to what the loader checks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AbiEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct DeploymentJson {
    address: String,
    #[serde(default)]
    abi: Vec<AbiEntry>,
    receipt: ReceiptJson,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptJson {
    block_number: u64,
}

/// A single deployed contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub chain_id: u64,
    pub name: String,
    pub address: Address,
    pub deploy_block: BlockNumber,
    pub abi: Vec<AbiEntry>,
}

impl Deployment {
    /// A deployment whose ABI declares only the given events.
    pub fn with_events(
        chain_id: u64,
        name: &str,
        address: Address,
        deploy_block: BlockNumber,
        events: &[&str],
    ) -> Self {
        Self {
            chain_id,
            name: name.to_string(),
            address,
            deploy_block,
            abi: events
                .iter()
                .map(|e| AbiEntry {
                    kind: "event".to_string(),
                    name: (*e).to_string(),
                })
                .collect(),
        }
    }

    /// Whether the ABI declares an event called `name`.
    pub fn has_event(&self, name: &str) -> bool {
        self.abi.iter().any(|e| e.kind == "event" && e.name == name)
    }

    /// Parse one deployment file. The contract name is the file stem.
    pub fn load(path: &Path, chain_id: u64) -> SyncerResult<Self> {
        let data = fs::read_to_string(path).map_err(|e| {
            SyncerError::Deployment(format!(
                "failed to read deployment file at {}: {e}",
                path.display()
            ))
        })?;
        let parsed: DeploymentJson = serde_json::from_str(&data).map_err(|e| {
            SyncerError::Deployment(format!(
                "failed to parse deployment file at {}: {e}",
                path.display()
            ))
        })?;
        let address = Address::from_hex(&parsed.address).map_err(|e| {
            SyncerError::Deployment(format!("invalid address in {}: {e}", path.display()))
        })?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                SyncerError::Deployment(format!("unusable file name {}", path.display()))
            })?
            .to_string();

        Ok(Self {
            chain_id,
            name,
            address,
            deploy_block: parsed.receipt.block_number,
            abi: parsed.abi,
        })
    }
}

/// All contracts of one deployment directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployments {
    pub chain_id: u64,
    pub deployments: BTreeMap<String, Deployment>,
}

impl Deployments {
    pub fn new(chain_id: u64, deployments: impl IntoIterator<Item = Deployment>) -> Self {
        Self {
            chain_id,
            deployments: deployments
                .into_iter()
                .map(|d| (d.name.clone(), d))
                .collect(),
        }
    }

    /// Load every `*.json` file in `dir` together with `.chainId`.
    pub fn load(dir: &Path) -> SyncerResult<Self> {
        let chain_id = load_chain_id(dir)?;
        let entries = fs::read_dir(dir).map_err(|e| {
            SyncerError::Deployment(format!(
                "failed to read deployments directory at {}: {e}",
                dir.display()
            ))
        })?;

        let mut deployments = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| SyncerError::Deployment(e.to_string()))?;
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            let is_json = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            if !is_json {
                continue;
            }
            let deployment = Deployment::load(&path, chain_id)?;
            debug!(
                name = %deployment.name,
                address = %deployment.address,
                deploy_block = deployment.deploy_block,
                "loaded deployment"
            );
            deployments.insert(deployment.name.clone(), deployment);
        }

        Ok(Self {
            chain_id,
            deployments,
        })
    }

    pub fn get(&self, name: &str) -> SyncerResult<&Deployment> {
        self.deployments
            .get(name)
            .ok_or_else(|| SyncerError::Deployment(format!("no deployment of {name} contract found")))
    }
}

/// Read the decimal chain id from `<dir>/.chainId`.
pub fn load_chain_id(dir: &Path) -> SyncerResult<u64> {
    let path = dir.join(CHAIN_ID_FILE_NAME);
    let raw = fs::read_to_string(&path).map_err(|e| {
        SyncerError::Deployment(format!(
            "failed to read chain id file at {}: {e}",
            path.display()
        ))
    })?;
    raw.trim().parse::<u64>().map_err(|e| {
        SyncerError::Deployment(format!(
            "failed to parse chain id in {}: {e}",
            path.display()
        ))
    })
}
