//! Generic JSON-RPC 2.0 client over HTTP.
//!
//! Shared by the L1 client in this crate and the BFT chain client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Error)]
pub enum JsonRpcError {
    #[error("invalid endpoint {0}")]
    InvalidUrl(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    HttpStatus(StatusCode),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("response carried neither result nor error")]
    EmptyResponse,

    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorPayload>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorPayload {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Clone, Debug)]
pub struct JsonRpcClient {
    inner: Client,
    url: Url,
    next_id: Arc<AtomicU64>,
}

impl JsonRpcClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, JsonRpcError> {
        let url = Url::parse(endpoint)
            .map_err(|e| JsonRpcError::InvalidUrl(format!("{endpoint}: {e}")))?;
        let inner = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            inner,
            url,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.url
    }

    /// Issue a call and return the untyped `result`.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, JsonRpcError> {
        let payload = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self.inner.post(self.url.clone()).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(JsonRpcError::HttpStatus(response.status()));
        }

        let response: JsonRpcResponse = response.json().await?;
        if let Some(error) = response.error {
            let message = match error.data {
                Some(Value::String(data)) if !data.is_empty() => {
                    format!("{} ({data})", error.message)
                }
                _ => error.message,
            };
            return Err(JsonRpcError::Rpc {
                code: error.code,
                message,
            });
        }

        response.result.ok_or(JsonRpcError::EmptyResponse)
    }

    /// Issue a call and deserialise the result into `R`.
    pub async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<R, JsonRpcError> {
        let value = self.request(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }
}
