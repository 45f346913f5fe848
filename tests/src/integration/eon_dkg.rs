//! # Eon DKG: Consensus → Gossip
//!
//! Two keypers follow one consensus chain. Every message a keyper queues is
//! delivered back onto the chain one block later, the way the shutter
//! application would execute it. After the DKG the eon public key is signed
//! and published on gossip.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use kp_05_dkg::DkgResult;
    use kp_06_shuttermint::MockShuttermintClient;
    use kp_08_eon_publisher::EonKeyPublisher;
    use shared_bus::{GossipNetwork, InMemoryGossip, Messaging, P2PMessage};
    use tokio::time::timeout;

    use crate::integration::fixtures::{run_eon_dkg, ConsensusKeyper, EON, INSTANCE};

    #[tokio::test]
    async fn test_dkg_result_is_published_as_eon_key() {
        let chain = Arc::new(MockShuttermintClient::new());
        let mut keypers = vec![ConsensusKeyper::new(&chain, 1), ConsensusKeyper::new(&chain, 2)];
        let members: Vec<_> = keypers.iter().map(ConsensusKeyper::address).collect();
        run_eon_dkg(&chain, &mut keypers, 2).await;

        let mut results = Vec::new();
        for keyper in &keypers {
            let row = keyper.db.begin().await.get_dkg_result(EON).unwrap().unwrap();
            assert!(row.success, "{:?}", row.error);
            results.push(DkgResult::decode(&row.pure_result).unwrap());
        }
        assert_eq!(results[0].public_key, results[1].public_key);
        assert_eq!(results[0].keyper, 0);
        assert_eq!(results[1].keyper, 1);

        // one publisher tick signs and sends the pending eon key
        let network = GossipNetwork::new();
        let peer = InMemoryGossip::join(&network, INSTANCE);
        let mut inbound = peer.subscribe();
        let publisher = EonKeyPublisher::new(
            keypers[0].db.clone(),
            Arc::new(InMemoryGossip::join(&network, INSTANCE)),
            Arc::new(keypers[0].key.clone()),
            INSTANCE,
        );
        assert_eq!(publisher.publish_pending().await.unwrap(), 1);

        let msg = timeout(Duration::from_secs(5), inbound.recv())
            .await
            .unwrap()
            .unwrap();
        let P2PMessage::EonPublicKey(published) = msg else {
            panic!("unexpected gossip message {msg:?}");
        };
        assert_eq!(published.eon, EON);
        assert_eq!(published.activation_block, 200);
        assert_eq!(published.keyper_config_index, 1);
        assert_eq!(published.public_key, results[0].public_key.to_bytes());
        assert_eq!(published.signer().unwrap(), members[0]);

        assert!(keypers[0].db.read().get_eon_public_keys().unwrap().is_empty());
    }
}
