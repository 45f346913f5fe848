//! Endpoint handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use keyper_telemetry::encode_metrics;
use kp_02_storage::{Database, StorageError, Tx};
use kp_05_dkg::DkgResult;
use kp_07_epoch_keys::{EpochKeyError, TriggerRequest, TriggerSink};
use prometheus::Registry;
use shared_types::{EonIndex, EpochId, InstanceId};
use tracing::{error, info};

use crate::domain::error::ApiError;
use crate::domain::types::{EonInfo, TriggerBody};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub triggers: Arc<dyn TriggerSink>,
    pub instance_id: InstanceId,
    pub registry: Registry,
    pub enable_write_operations: bool,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("instance_id", &self.instance_id)
            .field("enable_write_operations", &self.enable_write_operations)
            .finish_non_exhaustive()
    }
}

pub async fn ping() -> &'static str {
    "pong"
}

/// `GET /v1/decryption-key/{eon}/{epoch_id}`
pub async fn get_decryption_key(
    State(state): State<AppState>,
    Path((eon, epoch_id)): Path<(String, String)>,
) -> Result<Json<String>, ApiError> {
    let eon: EonIndex = eon
        .parse()
        .map_err(|_| ApiError::bad_request(format!("invalid eon {eon:?}")))?;
    let epoch_id = parse_epoch_id(&epoch_id)?;

    let key = state
        .db
        .read()
        .get_decryption_key(eon, &epoch_id)
        .map_err(storage_error)?;
    match key {
        Some(key) => Ok(Json(format!("0x{}", hex::encode(key)))),
        None => Err(ApiError::not_found(format!(
            "no decryption key for eon {eon} and epoch 0x{}",
            hex::encode(epoch_id.as_bytes())
        ))),
    }
}

/// `GET /v1/eons`
pub async fn get_eons(State(state): State<AppState>) -> Result<Json<Vec<EonInfo>>, ApiError> {
    let tx = state.db.read();
    eon_infos(&tx).map(Json)
}

fn eon_infos(tx: &Tx) -> Result<Vec<EonInfo>, ApiError> {
    let eons = tx.get_all_eons().map_err(storage_error)?;
    let mut infos = Vec::with_capacity(eons.len());
    for eon in eons {
        let result = tx.get_dkg_result(eon.eon).map_err(storage_error)?;
        let (finished, successful, eon_key) = match result {
            None => (false, false, String::new()),
            Some(row) if row.success => {
                let result = DkgResult::decode(&row.pure_result).map_err(|err| {
                    error!(eon = eon.eon, error = %err, "[api] stored dkg result does not decode");
                    ApiError::internal("corrupt dkg result")
                })?;
                (true, true, hex::encode(result.public_key.to_bytes()))
            }
            Some(_) => (true, false, String::new()),
        };
        infos.push(EonInfo {
            index: eon.eon,
            activation_block_number: eon.activation_block,
            eon_key,
            finished,
            successful,
        });
    }
    Ok(infos)
}

/// `POST /v1/decryption-trigger`
pub async fn post_decryption_trigger(
    State(state): State<AppState>,
    body: Result<Json<TriggerBody>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    if !state.enable_write_operations {
        return Err(ApiError::forbidden("write operations are disabled"));
    }
    let Json(body) = body.map_err(|err| ApiError::bad_request(err.body_text()))?;
    let epoch_id = parse_epoch_id(&body.epoch_id)?;

    let request = TriggerRequest::admin(state.instance_id, epoch_id, body.block_number);
    state
        .triggers
        .submit_trigger(request)
        .await
        .map_err(|err| match err {
            EpochKeyError::QueueFull | EpochKeyError::QueueClosed => {
                ApiError::unavailable(err.to_string())
            }
            other => ApiError::internal(other.to_string()),
        })?;
    info!(%epoch_id, block = body.block_number, "[api] decryption trigger submitted");
    Ok(StatusCode::ACCEPTED)
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    render_metrics(&state.registry)
}

/// `GET /metrics` of the standalone metrics listener.
pub async fn registry_metrics(
    State(registry): State<Registry>,
) -> Result<impl IntoResponse, ApiError> {
    render_metrics(&registry)
}

fn render_metrics(registry: &Registry) -> Result<impl IntoResponse, ApiError> {
    let text = encode_metrics(registry).map_err(|err| ApiError::internal(err.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], text))
}

pub async fn fallback() -> ApiError {
    ApiError::not_found("no such endpoint")
}

fn parse_epoch_id(raw: &str) -> Result<EpochId, ApiError> {
    EpochId::from_hex(raw).map_err(|err| ApiError::bad_request(format!("invalid epoch id: {err}")))
}

fn storage_error(err: StorageError) -> ApiError {
    error!(error = %err, "[api] storage error");
    ApiError::internal("storage error")
}
