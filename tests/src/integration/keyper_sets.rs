//! # Keyper Sets: L1 → Consensus
//!
//! A keyper config appears on L1, the chain observer stores it once it is
//! final, the orchestrator proposes it to the consensus chain close to its
//! activation block, and the node checks in once the chain accepts it.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use kp_02_storage::{Database, SyncCursor};
    use kp_03_event_syncer::{Contracts, EventKind, MockEthereumClient};
    use kp_04_chain_observer::{ChainObserver, KeyperSetHandler, ObserverError};
    use kp_06_shuttermint::{BatchConfig, Event, Message, MockMessageSender, MockShuttermintClient};
    use node_runtime::{KeyperError, Orchestrator, Supervisor};
    use shared_crypto::Secp256k1KeyPair;
    use shared_types::{Address, Clock, KeyperSet, MockClock, Shutdown, ShutdownSignal};
    use tokio::sync::mpsc;

    use crate::integration::fixtures::{
        consensus_driver, deployments, keyper_config_event, KEYPERS_ADDR, KEYPER_CONFIG_ADDR,
    };

    const B: Address = Address([0xb0; 20]);
    const C: Address = Address([0xc0; 20]);
    const GENESIS_KEYPER: Address = Address([0xee; 20]);

    async fn cursor(db: &Database) -> Option<SyncCursor> {
        db.begin().await.get_sync_cursor().unwrap()
    }

    fn drain(outbox: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Message> {
        std::iter::from_fn(|| outbox.try_recv().ok()).collect()
    }

    /// Run the observer until its cursor reaches `target`.
    async fn observe_until(observer: ChainObserver, db: &Database, target: SyncCursor) {
        let observer = Arc::new(observer);
        let (signal, shutdown) = ShutdownSignal::new();
        let task = {
            let observer = Arc::clone(&observer);
            tokio::spawn(async move { observer.run(&shutdown).await })
        };
        for _ in 0..50 {
            if cursor(db).await == Some(target) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        signal.trigger();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_keyper_config_reaches_consensus_chain() {
        let me = Secp256k1KeyPair::generate();
        let a = me.address();
        let db = Database::in_memory();

        // L1: config 1 for [A, B, C] emitted at block 100.
        let eth = Arc::new(MockEthereumClient::new());
        eth.set_addrs(KEYPERS_ADDR, 1, vec![a, B, C]);
        eth.emit(KEYPER_CONFIG_ADDR, &keyper_config_event(200, 1, 1, 2), 100, 0);
        eth.set_block_number(103);

        let contracts = Contracts::new(eth.clone(), deployments(100)).unwrap();
        let observer = ChainObserver::new(eth.clone(), db.clone()).register_event(
            contracts.keypers_configs_list_new_config(),
            Arc::new(KeyperSetHandler::new(contracts.keypers.clone())),
        );
        observe_until(observer, &db, SyncCursor::new(101, 0)).await;

        assert_eq!(cursor(&db).await, Some(SyncCursor::new(101, 0)));
        assert_eq!(
            db.begin().await.get_keyper_set(1).unwrap(),
            Some(KeyperSet {
                index: 1,
                activation_block: 200,
                keypers: vec![a, B, C],
                threshold: 2,
            })
        );

        // Consensus chain: only the genesis config so far.
        let chain = Arc::new(MockShuttermintClient::new());
        chain.add_event(&Event::BatchConfig(BatchConfig {
            height: 1,
            activation_block_number: 0,
            threshold: 1,
            keypers: vec![GENESIS_KEYPER],
            config_index: 0,
        }));
        let (sender, mut outbox) = MockMessageSender::new();
        let clock: Arc<dyn Clock> = Arc::new(MockClock::default());
        let orchestrator = Orchestrator::new(
            db.clone(),
            eth.clone(),
            consensus_driver(&chain, &db, a, 1),
            Arc::new(sender),
            clock,
            a,
            50,
        );

        eth.set_block_number(199);
        orchestrator.tick(&Shutdown::never()).await.unwrap();
        let proposal = Message::BatchConfig {
            activation_block_number: 200,
            keypers: vec![a, B, C],
            threshold: 2,
            keyper_config_index: 1,
        };
        assert_eq!(drain(&mut outbox), vec![proposal.clone()]);
        assert_eq!(db.begin().await.get_last_batch_config_sent().unwrap(), Some(1));

        // The chain accepts the proposal; the next tick must not repeat it
        // and the node checks in as a member of the new set.
        chain.deliver(a, 2, &proposal);
        eth.set_block_number(200);
        orchestrator.tick(&Shutdown::never()).await.unwrap();
        let sent = drain(&mut outbox);
        assert!(!sent.iter().any(|m| matches!(m, Message::BatchConfig { .. })));
        assert!(sent.iter().any(|m| matches!(m, Message::CheckIn { .. })));
        assert_eq!(db.begin().await.get_last_batch_config_sent().unwrap(), Some(1));
        assert_eq!(
            db.begin().await.get_latest_batch_config().unwrap().unwrap().config_index,
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unhandled_event_stops_the_node() {
        let eth = Arc::new(MockEthereumClient::new());
        eth.emit(KEYPER_CONFIG_ADDR, &keyper_config_event(200, 0, 0, 1), 100, 0);
        eth.set_block_number(103);
        let db = Database::in_memory();
        let contracts = Contracts::new(eth.clone(), deployments(100)).unwrap();
        let observer = ChainObserver::new(eth.clone(), db.clone())
            .follow_event(contracts.keypers_configs_list_new_config());

        let (signal, _) = ShutdownSignal::new();
        let mut supervisor = Supervisor::new(signal);
        let shutdown = supervisor.shutdown();
        supervisor.spawn("chain-observer", async move {
            observer.run(&shutdown).await.map_err(KeyperError::from)
        });
        let shutdown = supervisor.shutdown();
        supervisor.spawn("bystander", async move {
            shutdown.wait().await;
            Ok(())
        });

        let err = supervisor.join().await.unwrap_err();
        assert!(
            matches!(
                err,
                KeyperError::Observer(ObserverError::NoHandler(
                    EventKind::KeypersConfigsListNewConfig
                ))
            ),
            "{err}"
        );
        assert!(err.is_fatal());
        assert_eq!(cursor(&db).await, None);
    }
}
