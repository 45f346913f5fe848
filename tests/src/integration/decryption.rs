//! # Decryption: Trigger → Shares → Key
//!
//! Keypers with a finished eon DKG receive a decryption trigger, exchange
//! key shares over gossip and serve the assembled key over HTTP. Keys that
//! do not verify against the eon public key never reach the database.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use kp_02_storage::Database;
    use kp_05_dkg::testkeygen::EonKeys;
    use kp_05_dkg::{EpochKg, EpochSecretKey, EpochSecretKeyShareMsg};
    use kp_07_epoch_keys::{
        trigger_channel, EpochKeyHandler, EpochKeyService, TriggerQueue, TRIGGER_QUEUE_CAPACITY,
    };
    use kp_09_api_gateway::{build_router, AppState};
    use prometheus::Registry;
    use serde_json::Value;
    use shared_bus::{DecryptionKey, DecryptionTrigger, GossipNetwork, InMemoryGossip, Messaging, P2PMessage};
    use shared_crypto::Secp256k1KeyPair;
    use shared_types::{EpochId, KeyperIndex, Shutdown, ShutdownSignal};
    use tokio::task::JoinHandle;
    use tower::ServiceExt;

    use crate::integration::fixtures::{keyper_address, seed_eon, wait_for_key, EON, INSTANCE};

    struct Node {
        db: Database,
        gossip: Arc<InMemoryGossip>,
        queue: TriggerQueue,
        service: Arc<EpochKeyService>,
    }

    async fn node(
        network: &GossipNetwork,
        keys: &EonKeys,
        index: KeyperIndex,
        collator: &Secp256k1KeyPair,
    ) -> Node {
        let db = Database::in_memory();
        seed_eon(&db, keys, index, collator).await;
        let gossip = Arc::new(InMemoryGossip::join(network, INSTANCE));
        let handler = Arc::new(EpochKeyHandler::new(db.clone(), INSTANCE, keyper_address(index)));
        let (queue, receiver) = trigger_channel(TRIGGER_QUEUE_CAPACITY);
        let service = Arc::new(EpochKeyService::new(handler, gossip.clone(), receiver));
        Node {
            db,
            gossip,
            queue,
            service,
        }
    }

    fn spawn(node: &Node, shutdown: &Shutdown) -> JoinHandle<()> {
        let service = node.service.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { service.run(&shutdown).await.unwrap() })
    }

    fn router(node: &Node) -> Router {
        build_router(AppState {
            db: node.db.clone(),
            triggers: Arc::new(node.queue.clone()),
            instance_id: INSTANCE,
            registry: Registry::new(),
            enable_write_operations: true,
        })
    }

    fn key_uri(epoch: &EpochId) -> String {
        format!("/v1/decryption-key/{EON}/0x{}", hex::encode(epoch.as_bytes()))
    }

    async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    /// A key for `epoch` under a different eon secret.
    fn foreign_key(epoch: &EpochId) -> Vec<u8> {
        let other = EonKeys::generate_seeded(3, 2, 99);
        let mut kg = EpochKg::new(other.dkg_result(0, EON));
        for sender in 0..2 {
            kg.handle_epoch_secret_key_share(EpochSecretKeyShareMsg {
                eon: EON,
                epoch_id: *epoch,
                sender,
                share: other.dkg_result(sender, EON).epoch_secret_key_share(epoch),
            })
            .unwrap();
        }
        kg.secret_key(epoch).unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_admin_trigger_yields_served_key() {
        let network = GossipNetwork::new();
        let keys = EonKeys::generate_seeded(3, 2, 21);
        let collator = Secp256k1KeyPair::generate();
        let a = node(&network, &keys, 0, &collator).await;
        let b = node(&network, &keys, 1, &collator).await;
        let collator_peer = InMemoryGossip::join(&network, INSTANCE);
        let (signal, shutdown) = ShutdownSignal::new();
        let tasks = [spawn(&a, &shutdown), spawn(&b, &shutdown)];
        tokio::time::sleep(Duration::from_millis(20)).await;

        let api = router(&a);
        let epoch = EpochId::from_u64(1);
        let (status, body) = get(&api, &key_uri(&epoch)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");

        let response = api
            .clone()
            .oneshot(
                Request::post("/v1/decryption-trigger")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"epoch_id": "0x01", "block_number": 210}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let trigger = DecryptionTrigger::signed(INSTANCE, epoch, 210, &collator).unwrap();
        collator_peer.send(trigger.into()).await.unwrap();

        let key = wait_for_key(&a.db, &epoch).await;
        assert_eq!(wait_for_key(&b.db, &epoch).await, key);
        let assembled = EpochSecretKey::from_bytes(&key).unwrap();
        assert!(keys.dkg_result(0, EON).verify_key(&assembled, &epoch));

        let (status, body) = get(&api, &key_uri(&epoch)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::from(format!("0x{}", hex::encode(&key))));

        signal.trigger();
        for task in tasks {
            task.await.unwrap();
        }
        for n in [&a, &b] {
            let shares = n
                .gossip
                .sent_messages()
                .into_iter()
                .filter(|m| matches!(m, P2PMessage::DecryptionKeyShare(_)))
                .count();
            assert_eq!(shares, 1);
        }
    }

    #[tokio::test]
    async fn test_unverifiable_key_is_dropped() {
        let network = GossipNetwork::new();
        let keys = EonKeys::generate_seeded(3, 2, 22);
        let collator = Secp256k1KeyPair::generate();
        let a = node(&network, &keys, 0, &collator).await;
        let attacker = InMemoryGossip::join(&network, INSTANCE);
        let (signal, shutdown) = ShutdownSignal::new();
        let task = spawn(&a, &shutdown);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let epoch = EpochId::from_u64(1);
        let key_msg = |key: Vec<u8>| {
            P2PMessage::DecryptionKey(DecryptionKey {
                instance_id: INSTANCE,
                eon: EON,
                epoch_id: epoch,
                key,
            })
        };
        attacker.send(key_msg(foreign_key(&epoch))).await.unwrap();

        // a valid key sent afterwards is the first one stored
        let mut kg = EpochKg::new(keys.dkg_result(0, EON));
        for sender in 0..2 {
            kg.handle_epoch_secret_key_share(EpochSecretKeyShareMsg {
                eon: EON,
                epoch_id: epoch,
                sender,
                share: keys.dkg_result(sender, EON).epoch_secret_key_share(&epoch),
            })
            .unwrap();
        }
        let valid = kg.secret_key(&epoch).unwrap().to_bytes();
        attacker.send(key_msg(valid.clone())).await.unwrap();

        assert_eq!(wait_for_key(&a.db, &epoch).await, valid);
        signal.trigger();
        task.await.unwrap();

        assert!(a.gossip.sent_messages().is_empty());
    }
}
