//! # Keyper Flow: DKG → Eon Key → HTTP
//!
//! Two keypers run a real eon DKG on the mock consensus chain. Their
//! databases then back the eon publisher, the epoch-key services on one
//! gossip network and the HTTP gateway, exactly as the node wires them.
//! Decryption triggers go in through `POST /v1/decryption-trigger` and the
//! assembled key comes out of `GET /v1/decryption-key`.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use kp_02_storage::{CollatorRow, Database};
    use kp_05_dkg::{DkgResult, EpochSecretKey};
    use kp_06_shuttermint::MockShuttermintClient;
    use kp_07_epoch_keys::{
        trigger_channel, EpochKeyHandler, EpochKeyService, TriggerQueue, TRIGGER_QUEUE_CAPACITY,
    };
    use kp_08_eon_publisher::EonKeyPublisher;
    use kp_09_api_gateway::{build_router, AppState};
    use prometheus::Registry;
    use serde_json::Value;
    use shared_bus::{DecryptionTrigger, GossipNetwork, InMemoryGossip, Messaging, P2PMessage};
    use shared_crypto::Secp256k1KeyPair;
    use shared_types::{BlockNumber, EpochId, ShutdownSignal};
    use tokio::task::JoinHandle;
    use tokio::time::timeout;
    use tower::ServiceExt;

    use crate::integration::fixtures::{
        run_eon_dkg, wait_for_key, ConsensusKeyper, ACTIVATION_BLOCK, EON, INSTANCE,
    };

    struct Node {
        db: Database,
        queue: TriggerQueue,
    }

    /// Keypers after a successful DKG, with their epoch-key services running.
    struct Committee {
        keypers: Vec<ConsensusKeyper>,
        nodes: Vec<Node>,
        network: GossipNetwork,
        collator: Secp256k1KeyPair,
        signal: ShutdownSignal,
        tasks: Vec<JoinHandle<()>>,
    }

    impl Committee {
        async fn after_dkg() -> Self {
            let chain = Arc::new(MockShuttermintClient::new());
            let mut keypers = vec![ConsensusKeyper::new(&chain, 1), ConsensusKeyper::new(&chain, 2)];
            run_eon_dkg(&chain, &mut keypers, 2).await;

            let collator = Secp256k1KeyPair::generate();
            let network = GossipNetwork::new();
            let (signal, shutdown) = ShutdownSignal::new();
            let mut nodes = Vec::new();
            let mut tasks = Vec::new();
            for keyper in &keypers {
                // what the chain observer stores from the collator contract
                let mut tx = keyper.db.begin().await;
                tx.insert_collator(&CollatorRow {
                    activation_block: 0,
                    collator: collator.address(),
                })
                .unwrap();
                tx.commit().unwrap();

                let handler = Arc::new(EpochKeyHandler::new(
                    keyper.db.clone(),
                    INSTANCE,
                    keyper.address(),
                ));
                let (queue, receiver) = trigger_channel(TRIGGER_QUEUE_CAPACITY);
                let service = EpochKeyService::new(
                    handler,
                    Arc::new(InMemoryGossip::join(&network, INSTANCE)),
                    receiver,
                );
                let shutdown = shutdown.clone();
                tasks.push(tokio::spawn(async move { service.run(&shutdown).await.unwrap() }));
                nodes.push(Node {
                    db: keyper.db.clone(),
                    queue,
                });
            }
            // let every service subscribe before anything is gossiped
            tokio::time::sleep(Duration::from_millis(20)).await;

            Self {
                keypers,
                nodes,
                network,
                collator,
                signal,
                tasks,
            }
        }

        fn api(&self, index: usize) -> Router {
            let node = &self.nodes[index];
            build_router(AppState {
                db: node.db.clone(),
                triggers: Arc::new(node.queue.clone()),
                instance_id: INSTANCE,
                registry: Registry::new(),
                enable_write_operations: true,
            })
        }

        /// The collator's signed trigger, as every keyper receives it.
        async fn gossip_trigger(&self, epoch: EpochId, block: BlockNumber) {
            let trigger = DecryptionTrigger::signed(INSTANCE, epoch, block, &self.collator).unwrap();
            InMemoryGossip::join(&self.network, INSTANCE)
                .send(trigger.into())
                .await
                .unwrap();
        }

        fn dkg_result(&self, index: usize) -> DkgResult {
            let row = self.nodes[index].db.read().get_dkg_result(EON).unwrap().unwrap();
            assert!(row.success, "{:?}", row.error);
            DkgResult::decode(&row.pure_result).unwrap()
        }

        async fn stop(self) {
            self.signal.trigger();
            for task in self.tasks {
                task.await.unwrap();
            }
        }
    }

    fn key_uri(epoch: &EpochId) -> String {
        format!("/v1/decryption-key/{EON}/0x{}", hex::encode(epoch.as_bytes()))
    }

    async fn get(api: &Router, uri: &str) -> (StatusCode, Value) {
        let response = api
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn post_trigger(api: &Router, epoch: &EpochId, block: BlockNumber) -> StatusCode {
        let body = serde_json::json!({
            "epoch_id": format!("0x{}", hex::encode(epoch.as_bytes())),
            "block_number": block,
        });
        api.clone()
            .oneshot(
                Request::post("/v1/decryption-trigger")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_dkg_to_served_decryption_key() {
        let committee = Committee::after_dkg().await;
        let api = committee.api(0);

        // one publisher tick puts the eon key on gossip
        let mut listener = InMemoryGossip::join(&committee.network, INSTANCE).subscribe();
        let publisher = EonKeyPublisher::new(
            committee.nodes[0].db.clone(),
            Arc::new(InMemoryGossip::join(&committee.network, INSTANCE)),
            Arc::new(committee.keypers[0].key.clone()),
            INSTANCE,
        );
        assert_eq!(publisher.publish_pending().await.unwrap(), 1);
        let msg = timeout(Duration::from_secs(5), listener.recv())
            .await
            .unwrap()
            .unwrap();
        let P2PMessage::EonPublicKey(published) = msg else {
            panic!("unexpected gossip message {msg:?}");
        };
        assert_eq!(published.eon, EON);
        assert_eq!(published.signer().unwrap(), committee.keypers[0].address());

        // the gateway reports the eon with the key that was published
        let (status, eons) = get(&api, "/v1/eons").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(eons[0]["index"], EON);
        assert_eq!(eons[0]["activation_block_number"], ACTIVATION_BLOCK);
        assert_eq!(eons[0]["successful"], true);
        assert_eq!(eons[0]["eon_key"], hex::encode(&published.public_key));

        let epoch = EpochId::from_u64(1);
        let (status, body) = get(&api, &key_uri(&epoch)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");

        assert_eq!(post_trigger(&api, &epoch, 210).await, StatusCode::ACCEPTED);
        committee.gossip_trigger(epoch, 210).await;

        let key = wait_for_key(&committee.nodes[0].db, &epoch).await;
        assert_eq!(wait_for_key(&committee.nodes[1].db, &epoch).await, key);
        let assembled = EpochSecretKey::from_bytes(&key).unwrap();
        assert!(committee.dkg_result(0).verify_key(&assembled, &epoch));
        assert!(committee.dkg_result(1).verify_key(&assembled, &epoch));

        let (status, body) = get(&api, &key_uri(&epoch)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::from(format!("0x{}", hex::encode(&key))));

        // the second keyper's gateway serves the same key
        let (status, body) = get(&committee.api(1), &key_uri(&epoch)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::from(format!("0x{}", hex::encode(&key))));

        committee.stop().await;
    }

    #[tokio::test]
    async fn test_trigger_before_activation_is_never_served() {
        let committee = Committee::after_dkg().await;
        let api = committee.api(0);
        let early = EpochId::from_u64(1);
        let later = EpochId::from_u64(2);

        // no eon is active at block 150, so the trigger is accepted then dropped
        assert_eq!(post_trigger(&api, &early, 150).await, StatusCode::ACCEPTED);
        assert_eq!(post_trigger(&api, &later, 210).await, StatusCode::ACCEPTED);
        committee.gossip_trigger(later, 210).await;

        // the early trigger was queued first and left nothing behind
        wait_for_key(&committee.nodes[0].db, &later).await;
        let (status, _) = get(&api, &key_uri(&early)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let tx = committee.nodes[0].db.read();
        assert!(tx.get_decryption_key_share(EON, &early, 0).unwrap().is_none());
        assert!(tx.get_decryption_trigger(EON, &early).unwrap().is_none());

        committee.stop().await;
    }

    #[tokio::test]
    async fn test_writes_disabled_gateway_refuses_trigger() {
        let committee = Committee::after_dkg().await;
        let node = &committee.nodes[0];
        let api = build_router(AppState {
            db: node.db.clone(),
            triggers: Arc::new(node.queue.clone()),
            instance_id: INSTANCE,
            registry: Registry::new(),
            enable_write_operations: false,
        });
        let epoch = EpochId::from_u64(1);

        assert_eq!(post_trigger(&api, &epoch, 210).await, StatusCode::FORBIDDEN);
        // nothing was queued, so there is no key
        let (status, _) = get(&api, &key_uri(&epoch)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // once the collator triggers, both keypers share and the key is served
        committee.gossip_trigger(epoch, 210).await;
        let key = wait_for_key(&node.db, &epoch).await;
        let (status, body) = get(&api, &key_uri(&epoch)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::from(format!("0x{}", hex::encode(&key))));

        committee.stop().await;
    }
}
