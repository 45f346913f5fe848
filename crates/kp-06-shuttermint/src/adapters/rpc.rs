//! [`ShuttermintClient`] over the BFT node's JSON-RPC interface.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use kp_03_event_syncer::{JsonRpcClient, JsonRpcError};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::json;

use crate::domain::events::AbciEvent;
use crate::error::{ClientError, ClientResult};
use crate::ports::outbound::{BroadcastResult, ShuttermintClient, TxQuery, TxResult, TxSearchPage};

impl From<JsonRpcError> for ClientError {
    fn from(err: JsonRpcError) -> Self {
        ClientError::Rpc(err.to_string())
    }
}

// The node encodes 64-bit integers as JSON strings.
fn int_from_string<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }
    let text = match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    };
    text.parse::<T>().map_err(de::Error::custom)
}

#[derive(Debug, Deserialize)]
struct BlockResponse {
    block: Option<RpcBlock>,
}

#[derive(Debug, Deserialize)]
struct RpcBlock {
    last_commit: Option<RpcCommit>,
}

#[derive(Debug, Deserialize)]
struct RpcCommit {
    #[serde(deserialize_with = "int_from_string")]
    height: i64,
}

#[derive(Debug, Deserialize)]
struct TxSearchResponse {
    #[serde(default)]
    txs: Vec<RpcTx>,
    #[serde(deserialize_with = "int_from_string")]
    total_count: u64,
}

#[derive(Debug, Deserialize)]
struct RpcTx {
    #[serde(deserialize_with = "int_from_string")]
    height: i64,
    #[serde(default)]
    index: u32,
    tx_result: RpcTxResult,
}

#[derive(Debug, Default, Deserialize)]
struct RpcTxResult {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    log: String,
    #[serde(default)]
    events: Vec<AbciEvent>,
}

#[derive(Debug, Deserialize)]
struct BroadcastResponse {
    check_tx: RpcTxResult,
    #[serde(alias = "tx_result")]
    deliver_tx: RpcTxResult,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    node_info: NodeInfo,
}

#[derive(Debug, Deserialize)]
struct NodeInfo {
    network: String,
}

#[derive(Clone, Debug)]
pub struct RpcShuttermintClient {
    rpc: JsonRpcClient,
}

impl RpcShuttermintClient {
    pub fn new(url: &str, timeout: Duration) -> ClientResult<Self> {
        Ok(Self {
            rpc: JsonRpcClient::new(url, timeout)?,
        })
    }
}

#[async_trait]
impl ShuttermintClient for RpcShuttermintClient {
    async fn last_committed_height(&self) -> ClientResult<Option<i64>> {
        let response: BlockResponse = self.rpc.call("block", json!({})).await?;
        Ok(response
            .block
            .and_then(|b| b.last_commit)
            .map(|c| c.height)
            .filter(|h| *h > 0))
    }

    async fn tx_search(
        &self,
        query: &TxQuery,
        page: u64,
        per_page: u64,
    ) -> ClientResult<TxSearchPage> {
        let params = json!({
            "query": query.to_string(),
            "prove": false,
            "page": page.to_string(),
            "per_page": per_page.to_string(),
            "order_by": "asc",
        });
        let response: TxSearchResponse = self.rpc.call("tx_search", params).await?;
        Ok(TxSearchPage {
            txs: response
                .txs
                .into_iter()
                .map(|tx| TxResult {
                    height: tx.height,
                    index: tx.index,
                    events: tx.tx_result.events,
                })
                .collect(),
            total_count: response.total_count,
        })
    }

    async fn broadcast_tx_commit(&self, tx: Vec<u8>) -> ClientResult<BroadcastResult> {
        let params = json!({ "tx": STANDARD.encode(tx) });
        let response: BroadcastResponse = self.rpc.call("broadcast_tx_commit", params).await?;
        Ok(BroadcastResult {
            check_tx_code: response.check_tx.code,
            check_tx_log: response.check_tx.log,
            deliver_tx_code: response.deliver_tx.code,
            deliver_tx_log: response.deliver_tx.log,
        })
    }

    async fn chain_id(&self) -> ClientResult<String> {
        let status: StatusResponse = self.rpc.call("status", json!({})).await?;
        if status.node_info.network.is_empty() {
            return Err(ClientError::Decode("node reports an empty chain id".into()));
        }
        Ok(status.node_info.network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_search_response_parsed() {
        let raw = r#"{
            "txs": [{
                "hash": "AB",
                "height": "17",
                "index": 1,
                "tx_result": {
                    "code": 0,
                    "events": [{
                        "type": "shutter.batch-config-started",
                        "attributes": [{"key": "ConfigIndex", "value": "3", "index": true}]
                    }]
                }
            }],
            "total_count": "1"
        }"#;
        let response: TxSearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.total_count, 1);
        assert_eq!(response.txs[0].height, 17);
        assert_eq!(response.txs[0].tx_result.events[0].attributes[0].value, "3");
    }

    #[test]
    fn test_empty_chain_has_no_last_commit() {
        let response: BlockResponse =
            serde_json::from_str(r#"{"block_id": {}, "block": {"last_commit": null}}"#).unwrap();
        assert!(response.block.and_then(|b| b.last_commit).is_none());
    }

    #[test]
    fn test_broadcast_response_parsed() {
        let raw = r#"{
            "check_tx": {"code": 0, "log": ""},
            "deliver_tx": {"code": 2, "log": "already seen"},
            "hash": "00",
            "height": "5"
        }"#;
        let response: BroadcastResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.check_tx.code, 0);
        assert_eq!(response.deliver_tx.code, 2);
        assert_eq!(response.deliver_tx.log, "already seen");
    }

    #[test]
    fn test_query_text() {
        let query = TxQuery {
            min_height: 1,
            max_height: 500,
        };
        assert_eq!(query.to_string(), "tx.height >= 1 and tx.height <= 500");
    }
}
