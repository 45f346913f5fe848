//! [`EthereumClient`] over the standard `eth_*` JSON-RPC methods.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use shared_types::{Address, BlockNumber, Hash};

use crate::adapters::jsonrpc::{JsonRpcClient, JsonRpcError};
use crate::domain::log::{FilterQuery, Log};
use crate::error::{SyncerError, SyncerResult};
use crate::ports::outbound::EthereumClient;

impl From<JsonRpcError> for SyncerError {
    fn from(err: JsonRpcError) -> Self {
        SyncerError::Rpc(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    address: String,
    topics: Vec<String>,
    data: String,
    block_number: String,
    log_index: String,
    #[serde(default)]
    removed: bool,
}

impl RpcLog {
    fn into_log(self) -> SyncerResult<Log> {
        let address =
            Address::from_hex(&self.address).map_err(|e| SyncerError::Rpc(e.to_string()))?;
        let topics = self
            .topics
            .iter()
            .map(|t| parse_hash(t))
            .collect::<SyncerResult<Vec<_>>>()?;
        Ok(Log {
            address,
            topics,
            data: parse_bytes(&self.data)?,
            block_number: parse_quantity(&self.block_number)?,
            log_index: parse_quantity(&self.log_index)?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct RpcEthereumClient {
    rpc: JsonRpcClient,
}

impl RpcEthereumClient {
    pub fn new(url: &str, timeout: Duration) -> SyncerResult<Self> {
        Ok(Self {
            rpc: JsonRpcClient::new(url, timeout)?,
        })
    }
}

#[async_trait]
impl EthereumClient for RpcEthereumClient {
    async fn block_number(&self) -> SyncerResult<BlockNumber> {
        let raw: String = self.rpc.call("eth_blockNumber", json!([])).await?;
        parse_quantity(&raw)
    }

    async fn filter_logs(&self, query: &FilterQuery) -> SyncerResult<Vec<Log>> {
        let params = json!([{
            "fromBlock": format_quantity(query.from_block),
            "toBlock": format_quantity(query.to_block),
            "address": query.address.to_hex(),
            "topics": [format!("0x{}", hex::encode(query.topic0))],
        }]);
        let logs: Vec<RpcLog> = self.rpc.call("eth_getLogs", params).await?;
        logs.into_iter()
            .filter(|l| !l.removed)
            .map(RpcLog::into_log)
            .collect()
    }

    async fn call(&self, to: Address, data: Vec<u8>) -> SyncerResult<Vec<u8>> {
        let params = json!([
            { "to": to.to_hex(), "data": format!("0x{}", hex::encode(data)) },
            "latest"
        ]);
        let raw: String = self.rpc.call("eth_call", params).await?;
        parse_bytes(&raw)
    }

    async fn send_raw_transaction(&self, raw: Vec<u8>) -> SyncerResult<Hash> {
        let params = json!([format!("0x{}", hex::encode(raw))]);
        let hash: String = self.rpc.call("eth_sendRawTransaction", params).await?;
        parse_hash(&hash)
    }

    async fn chain_id(&self) -> SyncerResult<u64> {
        let raw: String = self.rpc.call("eth_chainId", json!([])).await?;
        parse_quantity(&raw)
    }
}

fn format_quantity(n: u64) -> String {
    format!("0x{n:x}")
}

fn parse_quantity(s: &str) -> SyncerResult<u64> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| SyncerError::Rpc(format!("quantity without 0x prefix: {s}")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| SyncerError::Rpc(format!("bad quantity {s}: {e}")))
}

fn parse_bytes(s: &str) -> SyncerResult<Vec<u8>> {
    hex::decode(s.trim_start_matches("0x"))
        .map_err(|e| SyncerError::Rpc(format!("bad hex data: {e}")))
}

fn parse_hash(s: &str) -> SyncerResult<Hash> {
    let raw = parse_bytes(s)?;
    raw.as_slice()
        .try_into()
        .map_err(|_| SyncerError::Rpc(format!("expected 32-byte hash, got {} bytes", raw.len())))
}
