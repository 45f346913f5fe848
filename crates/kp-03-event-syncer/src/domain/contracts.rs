//! # Contract Bindings
//!
//! A [`ContractBinding`] is one record per deployed contract: its address,
//! the events it emits and three function values (`call`, `transact`,
//! `filter`) bound to an [`EthereumClient`]. Typed wrappers such as
//! [`AddrsSeq`] are thin layers over a binding.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use shared_types::{Address, BlockNumber, Hash};
use tracing::debug;

use crate::domain::abi;
use crate::domain::deployment::{Deployment, Deployments};
use crate::domain::events::{ContractEvent, EventKind, EventType};
use crate::domain::log::{FilterQuery, Log};
use crate::error::{SyncerError, SyncerResult};
use crate::ports::outbound::EthereumClient;

/// Read-only call with raw calldata, returns raw return data.
pub type CallFn = Arc<dyn Fn(Vec<u8>) -> BoxFuture<'static, SyncerResult<Vec<u8>>> + Send + Sync>;

/// Submit a signed transaction, returns its hash.
pub type TransactFn = Arc<dyn Fn(Vec<u8>) -> BoxFuture<'static, SyncerResult<Hash>> + Send + Sync>;

/// Fetch logs for a filter.
pub type FilterFn =
    Arc<dyn Fn(FilterQuery) -> BoxFuture<'static, SyncerResult<Vec<Log>>> + Send + Sync>;

// =============================================================================
// CONTRACT BINDING
// =============================================================================

pub struct ContractBinding {
    pub name: String,
    pub address: Address,
    pub deploy_block: BlockNumber,
    pub events: Vec<EventKind>,
    call_fn: CallFn,
    transact_fn: TransactFn,
    filter_fn: FilterFn,
}

impl ContractBinding {
    /// Bind a contract at `address` to `client`.
    pub fn bind(
        client: Arc<dyn EthereumClient>,
        name: impl Into<String>,
        address: Address,
        deploy_block: BlockNumber,
        events: Vec<EventKind>,
    ) -> Self {
        let call_client = Arc::clone(&client);
        let call_fn: CallFn = Arc::new(move |data| {
            let client = Arc::clone(&call_client);
            Box::pin(async move { client.call(address, data).await })
        });

        let transact_client = Arc::clone(&client);
        let transact_fn: TransactFn = Arc::new(move |raw| {
            let client = Arc::clone(&transact_client);
            Box::pin(async move { client.send_raw_transaction(raw).await })
        });

        let filter_fn: FilterFn = Arc::new(move |query| {
            let client = Arc::clone(&client);
            Box::pin(async move { client.filter_logs(&query).await })
        });

        Self::from_parts(
            name,
            address,
            deploy_block,
            events,
            call_fn,
            transact_fn,
            filter_fn,
        )
    }

    /// Assemble a binding from explicit function values.
    pub fn from_parts(
        name: impl Into<String>,
        address: Address,
        deploy_block: BlockNumber,
        events: Vec<EventKind>,
        call_fn: CallFn,
        transact_fn: TransactFn,
        filter_fn: FilterFn,
    ) -> Self {
        Self {
            name: name.into(),
            address,
            deploy_block,
            events,
            call_fn,
            transact_fn,
            filter_fn,
        }
    }

    /// Bind a deployed contract. Every event in `events` must be declared in
    /// the deployment's ABI.
    pub fn from_deployment(
        client: Arc<dyn EthereumClient>,
        deployment: &Deployment,
        events: Vec<EventKind>,
    ) -> SyncerResult<Self> {
        if let Some(missing) = events.iter().find(|k| !deployment.has_event(k.name())) {
            return Err(SyncerError::Deployment(format!(
                "ABI of {} does not declare event {}",
                deployment.name,
                missing.name()
            )));
        }
        Ok(Self::bind(
            client,
            deployment.name.clone(),
            deployment.address,
            deployment.deploy_block,
            events,
        ))
    }

    /// Call a function whose arguments are all `uint64`.
    pub async fn call(&self, signature: &str, args: &[u64]) -> SyncerResult<Vec<u8>> {
        (self.call_fn)(abi::encode_call(signature, args))
            .await
            .map_err(|e| SyncerError::Call(format!("{}.{signature}: {e}", self.name)))
    }

    pub async fn transact(&self, signed_tx: Vec<u8>) -> SyncerResult<Hash> {
        (self.transact_fn)(signed_tx).await
    }

    /// Logs of `kind` emitted in `[from_block, to_block]`.
    pub async fn filter(
        &self,
        kind: EventKind,
        from_block: BlockNumber,
        to_block: BlockNumber,
    ) -> SyncerResult<Vec<Log>> {
        (self.filter_fn)(FilterQuery {
            from_block,
            to_block,
            address: self.address,
            topic0: kind.topic(),
        })
        .await
    }

    /// Decode a log emitted by this contract.
    pub fn decode(&self, log: &Log) -> SyncerResult<ContractEvent> {
        let kind = self
            .events
            .iter()
            .find(|k| log.topic0() == Some(&k.topic()))
            .ok_or_else(|| SyncerError::Abi(format!("log is not an event of {}", self.name)))?;
        kind.decode(log)
    }

    /// Event type for the syncer.
    pub fn event_type(self: &Arc<Self>, kind: EventKind) -> EventType {
        EventType::new(Arc::clone(self), kind)
    }
}

impl fmt::Debug for ContractBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractBinding")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("deploy_block", &self.deploy_block)
            .field("events", &self.events)
            .finish()
    }
}

// =============================================================================
// ADDRESS SEQUENCE
// =============================================================================

/// Binding of the `AddrsSeq` contract: a sequence of address sets, indexed
/// by `n`, each an ordered list of addresses.
#[derive(Debug, Clone)]
pub struct AddrsSeq {
    binding: Arc<ContractBinding>,
}

impl AddrsSeq {
    pub const COUNT: &'static str = "count()";
    pub const COUNT_NTH: &'static str = "countNth(uint64)";
    pub const AT: &'static str = "at(uint64,uint64)";

    pub fn new(binding: Arc<ContractBinding>) -> Self {
        Self { binding }
    }

    pub fn binding(&self) -> &Arc<ContractBinding> {
        &self.binding
    }

    /// Number of address sets.
    pub async fn count(&self) -> SyncerResult<u64> {
        let out = self.binding.call(Self::COUNT, &[]).await?;
        abi::decode_u64(&out, 0)
    }

    /// Number of addresses in set `n`.
    pub async fn count_nth(&self, n: u64) -> SyncerResult<u64> {
        let out = self.binding.call(Self::COUNT_NTH, &[n]).await?;
        abi::decode_u64(&out, 0)
    }

    /// Address `i` of set `n`.
    pub async fn at(&self, n: u64, i: u64) -> SyncerResult<Address> {
        let out = self.binding.call(Self::AT, &[n, i]).await?;
        abi::decode_address(&out, 0)
    }

    /// Every address of set `n`, in order.
    pub async fn get_addrs(&self, n: u64) -> SyncerResult<Vec<Address>> {
        let len = self.count_nth(n).await?;
        let mut addrs = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
        for i in 0..len {
            addrs.push(self.at(n, i).await?);
        }
        debug!(contract = %self.binding.name, n, len, "read address set");
        Ok(addrs)
    }
}

// =============================================================================
// CONTRACT SET
// =============================================================================

/// The contracts the keyper follows on L1.
#[derive(Debug, Clone)]
pub struct Contracts {
    pub deployments: Deployments,
    pub keypers_configs_list: Arc<ContractBinding>,
    pub collator_configs_list: Arc<ContractBinding>,
    pub keypers: AddrsSeq,
    pub collators: AddrsSeq,
}

impl Contracts {
    pub const KEYPER_CONFIG: &'static str = "KeyperConfig";
    pub const COLLATOR_CONFIG: &'static str = "CollatorConfig";
    pub const KEYPERS: &'static str = "Keypers";
    pub const COLLATORS: &'static str = "Collators";

    pub fn new(client: Arc<dyn EthereumClient>, deployments: Deployments) -> SyncerResult<Self> {
        let bind = |name: &str, events: Vec<EventKind>| -> SyncerResult<Arc<ContractBinding>> {
            let deployment = deployments.get(name)?;
            Ok(Arc::new(ContractBinding::from_deployment(
                Arc::clone(&client),
                deployment,
                events,
            )?))
        };
        let addrs_seq_events = vec![EventKind::AddrsSeqAppended, EventKind::AddrsSeqAdded];

        let keypers_configs_list = bind(
            Self::KEYPER_CONFIG,
            vec![EventKind::KeypersConfigsListNewConfig],
        )?;
        let collator_configs_list = bind(
            Self::COLLATOR_CONFIG,
            vec![EventKind::CollatorConfigsListNewConfig],
        )?;
        let keypers = AddrsSeq::new(bind(Self::KEYPERS, addrs_seq_events.clone())?);
        let collators = AddrsSeq::new(bind(Self::COLLATORS, addrs_seq_events)?);

        Ok(Self {
            deployments,
            keypers_configs_list,
            collator_configs_list,
            keypers,
            collators,
        })
    }

    pub fn keypers_configs_list_new_config(&self) -> EventType {
        self.keypers_configs_list
            .event_type(EventKind::KeypersConfigsListNewConfig)
    }

    pub fn collator_configs_list_new_config(&self) -> EventType {
        self.collator_configs_list
            .event_type(EventKind::CollatorConfigsListNewConfig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::MockEthereumClient;

    fn deployments() -> Deployments {
        Deployments::new(
            1,
            [
                Deployment::with_events(1, Contracts::KEYPER_CONFIG, Address([1; 20]), 10, &["NewConfig"]),
                Deployment::with_events(1, Contracts::COLLATOR_CONFIG, Address([2; 20]), 11, &["NewConfig"]),
                Deployment::with_events(1, Contracts::KEYPERS, Address([3; 20]), 5, &["Appended", "Added"]),
                Deployment::with_events(1, Contracts::COLLATORS, Address([4; 20]), 6, &["Appended", "Added"]),
            ],
        )
    }

    #[tokio::test]
    async fn test_get_addrs_reads_every_index() {
        let client = Arc::new(MockEthereumClient::new());
        let keypers = vec![Address([0xA; 20]), Address([0xB; 20]), Address([0xC; 20])];
        client.set_addrs(Address([3; 20]), 0, vec![]);
        client.set_addrs(Address([3; 20]), 1, keypers.clone());

        let contracts = Contracts::new(client.clone(), deployments()).unwrap();
        assert_eq!(contracts.keypers.count().await.unwrap(), 2);
        assert_eq!(contracts.keypers.count_nth(1).await.unwrap(), 3);
        assert_eq!(contracts.keypers.get_addrs(1).await.unwrap(), keypers);
        assert!(contracts.keypers.get_addrs(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_event_types_carry_deploy_block() {
        let client = Arc::new(MockEthereumClient::new());
        let contracts = Contracts::new(client, deployments()).unwrap();
        let ev = contracts.keypers_configs_list_new_config();
        assert_eq!(ev.deploy_block(), 10);
        assert_eq!(ev.address(), Address([1; 20]));
        assert_eq!(ev.kind, EventKind::KeypersConfigsListNewConfig);
    }

    #[test]
    fn test_missing_event_in_abi_rejected() {
        let client = Arc::new(MockEthereumClient::new());
        let deployment = Deployment::with_events(1, "Keypers", Address([3; 20]), 5, &["Appended"]);
        let err = ContractBinding::from_deployment(
            client,
            &deployment,
            vec![EventKind::AddrsSeqAppended, EventKind::AddrsSeqAdded],
        )
        .unwrap_err();
        assert!(err.to_string().contains("Added"));
    }

    #[test]
    fn test_missing_deployment_rejected() {
        let client = Arc::new(MockEthereumClient::new());
        let err = Contracts::new(client, Deployments::new(1, [])).unwrap_err();
        assert!(matches!(err, SyncerError::Deployment(_)));
    }

    #[tokio::test]
    async fn test_decode_picks_event_by_topic() {
        let client = Arc::new(MockEthereumClient::new());
        let contracts = Contracts::new(client, deployments()).unwrap();
        let binding = contracts.keypers.binding();
        let log = Log {
            address: Address([3; 20]),
            topics: vec![EventKind::AddrsSeqAppended.topic()],
            data: abi::encode_u64(4).to_vec(),
            block_number: 1,
            log_index: 0,
        };
        assert_eq!(binding.decode(&log).unwrap().kind(), EventKind::AddrsSeqAppended);

        let foreign = Log {
            topics: vec![EventKind::KeypersConfigsListNewConfig.topic()],
            ..log
        };
        assert!(binding.decode(&foreign).is_err());
    }
}
