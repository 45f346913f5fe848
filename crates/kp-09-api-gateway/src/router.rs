//! Route table.
//!
//! | Method | Path | Answer |
//! |--------|------|--------|
//! | GET | `/v1/ping` | `pong` |
//! | GET | `/v1/decryption-key/{eon}/{epoch_id}` | `"0x.."` or 404 |
//! | GET | `/v1/eons` | eon list |
//! | POST | `/v1/decryption-trigger` | 202, or 403 with writes disabled |
//! | GET | `/metrics` | Prometheus text |

use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use prometheus::Registry;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    fallback, get_decryption_key, get_eons, metrics, ping, post_decryption_trigger,
    registry_metrics, AppState,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/decryption-key/:eon/:epoch_id", get(get_decryption_key))
        .route("/v1/eons", get(get_eons))
        .route("/v1/decryption-trigger", post(post_decryption_trigger))
        .route("/metrics", get(metrics))
        .fallback(fallback)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Router of a listener that only exposes `/metrics`.
pub fn build_metrics_router(registry: Registry) -> Router {
    Router::new()
        .route("/metrics", get(registry_metrics))
        .fallback(fallback)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use keyper_telemetry::KeyperMetrics;
    use kp_02_storage::{Database, DkgResultRow, EonRow};
    use kp_05_dkg::testkeygen::EonKeys;
    use kp_07_epoch_keys::{trigger_channel, TriggerRequest};
    use prometheus::Registry;
    use serde_json::Value;
    use shared_types::EpochId;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    const INSTANCE: u64 = 9;

    fn state(db: Database, writes: bool) -> (AppState, mpsc::Receiver<TriggerRequest>) {
        let (queue, receiver) = trigger_channel(4);
        let state = AppState {
            db,
            triggers: Arc::new(queue),
            instance_id: INSTANCE,
            registry: Registry::new(),
            enable_write_operations: writes,
        };
        (state, receiver)
    }

    async fn call(state: &AppState, request: Request<Body>) -> Response {
        build_router(state.clone()).oneshot(request).await.unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_trigger(body: &str) -> Request<Body> {
        Request::post("/v1/decryption-trigger")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let (state, _rx) = state(Database::in_memory(), false);
        let response = call(&state, get_req("/v1/ping")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"pong");
    }

    #[tokio::test]
    async fn test_decryption_key_lookup() {
        let db = Database::in_memory();
        let (state, _rx) = state(db.clone(), false);
        let epoch = EpochId::from_u64(1);
        let uri = format!("/v1/decryption-key/7/0x{}", hex::encode(epoch.as_bytes()));

        let response = call(&state, get_req(&uri)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(response).await["code"], "not_found");

        {
            let mut tx = db.begin().await;
            tx.insert_decryption_key(7, &epoch, vec![0xab, 0xcd]).unwrap();
            tx.commit().unwrap();
        }
        let response = call(&state, get_req(&uri)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await, Value::from("0xabcd"));

        let response = call(&state, get_req("/v1/decryption-key/x/0x01")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = call(&state, get_req("/v1/decryption-key/7/0xzz")).await;
        assert_eq!(json(response).await["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_eons() {
        let db = Database::in_memory();
        let keys = EonKeys::generate_seeded(3, 2, 1);
        {
            let mut tx = db.begin().await;
            for (eon, activation) in [(1, 100), (2, 200)] {
                tx.insert_eon(&EonRow {
                    eon,
                    start_height: 10 * eon as i64,
                    activation_block: activation,
                    config_index: 1,
                })
                .unwrap();
            }
            tx.insert_dkg_result(&DkgResultRow {
                eon: 1,
                success: true,
                error: None,
                pure_result: keys.dkg_result(0, 1).encode().unwrap(),
            })
            .unwrap();
            tx.commit().unwrap();
        }
        let (state, _rx) = state(db, false);

        let body = json(call(&state, get_req("/v1/eons")).await).await;
        let eons = body.as_array().unwrap();
        assert_eq!(eons.len(), 2);
        assert_eq!(eons[0]["index"], 1);
        assert_eq!(eons[0]["successful"], true);
        assert_eq!(
            eons[0]["eon_key"],
            Value::from(hex::encode(keys.public_key.to_bytes()))
        );
        assert_eq!(eons[1]["activation_block_number"], 200);
        assert_eq!(eons[1]["finished"], false);
        assert_eq!(eons[1]["eon_key"], "");
    }

    #[tokio::test]
    async fn test_reads_do_not_wait_for_open_transaction() {
        let db = Database::in_memory();
        let (state, _rx) = state(db.clone(), false);
        let _writer = db.begin().await;

        let response = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            call(&state, get_req("/v1/eons")),
        )
        .await
        .expect("eons lookup blocked by writer");
        assert_eq!(response.status(), StatusCode::OK);
        let uri = format!("/v1/decryption-key/7/0x{}", hex::encode(EpochId::from_u64(1).as_bytes()));
        let response = tokio::time::timeout(std::time::Duration::from_secs(1), call(&state, get_req(&uri)))
            .await
            .expect("key lookup blocked by writer");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_trigger_requires_write_operations() {
        let (state, mut rx) = state(Database::in_memory(), false);
        let body = r#"{"epoch_id": "0x01", "block_number": 210}"#;
        let response = call(&state, post_trigger(body)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json(response).await["code"], "forbidden");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_trigger_enqueued() {
        let (state, mut rx) = state(Database::in_memory(), true);
        let body = r#"{"epoch_id": "0x01", "block_number": 210}"#;
        let response = call(&state, post_trigger(body)).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let request = rx.try_recv().unwrap();
        assert_eq!(
            request,
            TriggerRequest::admin(INSTANCE, EpochId::from_u64(1), 210)
        );

        let response = call(&state, post_trigger(r#"{"epoch_id": 5}"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_trigger_queue_closed() {
        let (state, rx) = state(Database::in_memory(), true);
        drop(rx);
        let body = r#"{"epoch_id": "0x01", "block_number": 210}"#;
        let response = call(&state, post_trigger(body)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_metrics_and_fallback() {
        let (state, _rx) = state(Database::in_memory(), false);
        let metrics = KeyperMetrics::new(&state.registry).unwrap();
        metrics.decryption_keys_generated.inc();

        let response = call(&state, get_req("/metrics")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("shutter_epochkg_decryption_keys_generated_total 1"));

        let response = call(&state, get_req("/v1/nothing")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metrics_router() {
        let registry = Registry::new();
        KeyperMetrics::new(&registry).unwrap().l1_block_number.set(12);
        let router = build_metrics_router(registry);

        let response = router.clone().oneshot(get_req("/metrics")).await.unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("shutter_keyper_l1_block_number 12"));

        let response = router.oneshot(get_req("/v1/ping")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
