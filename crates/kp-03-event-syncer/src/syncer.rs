//! # Event Syncer Service
//!
//! One producer (`run`) pages through L1 and pushes raw logs plus page
//! terminators onto a bounded channel; one consumer (`next`) decodes them.
//!
//! ## Ordering
//!
//! Per-event queries of a page run concurrently. Their results are merged and
//! sorted by `(block_number, log_index)` before anything is sent, so the
//! output is a total order even across event types.

use std::cmp::min;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use kp_01_retry::{retry, RetryOptions};
use shared_types::{BlockNumber, Clock, Shutdown, SystemClock};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use crate::domain::events::{EventSyncUpdate, EventType};
use crate::domain::log::Log;
use crate::error::{SyncerError, SyncerResult};
use crate::ports::outbound::EthereumClient;

/// Blocks fetched per page.
pub const PAGE_SIZE_BLOCKS: u64 = 3;

/// Capacity of the channel between producer and consumer.
pub const OUTPUT_CHANNEL_CAPACITY: usize = 32;

/// Delay before polling the head again once caught up.
pub const BLOCK_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Blocks kept between the head and the last scanned block.
pub const DEFAULT_FINALITY_OFFSET: u64 = 3;

// =============================================================================
// CONFIGURATION
// =============================================================================

#[derive(Clone)]
pub struct SyncerConfig {
    pub finality_offset: u64,
    pub page_size: u64,
    pub poll_interval: Duration,
    pub channel_capacity: usize,
    pub clock: Arc<dyn Clock>,
    pub retry: RetryOptions<SyncerError>,
}

impl SyncerConfig {
    pub fn with_finality_offset(mut self, finality_offset: u64) -> Self {
        self.finality_offset = finality_offset;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.retry = self.retry.with_clock(Arc::clone(&clock));
        self.clock = clock;
        self
    }

    pub fn with_retry(mut self, retry: RetryOptions<SyncerError>) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SyncerConfig {
    fn default() -> Self {
        Self {
            finality_offset: DEFAULT_FINALITY_OFFSET,
            page_size: PAGE_SIZE_BLOCKS,
            poll_interval: BLOCK_POLL_INTERVAL,
            channel_capacity: OUTPUT_CHANNEL_CAPACITY,
            clock: Arc::new(SystemClock),
            retry: RetryOptions::default(),
        }
    }
}

impl fmt::Debug for SyncerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncerConfig")
            .field("finality_offset", &self.finality_offset)
            .field("page_size", &self.page_size)
            .field("poll_interval", &self.poll_interval)
            .field("channel_capacity", &self.channel_capacity)
            .field("retry", &self.retry)
            .finish()
    }
}

// =============================================================================
// SERVICE
// =============================================================================

enum SyncItem {
    Log { log: Log, event_type: EventType },
    Terminator(BlockNumber),
}

pub struct EventSyncer {
    client: Arc<dyn EthereumClient>,
    events: Vec<EventType>,
    from_block: BlockNumber,
    from_log_index: u64,
    config: SyncerConfig,
    running: AtomicBool,
    sender: mpsc::Sender<SyncItem>,
    receiver: Mutex<mpsc::Receiver<SyncItem>>,
}

impl EventSyncer {
    pub fn new(
        client: Arc<dyn EthereumClient>,
        finality_offset: u64,
        events: Vec<EventType>,
        from_block: BlockNumber,
        from_log_index: u64,
    ) -> Self {
        Self::with_config(
            client,
            SyncerConfig::default().with_finality_offset(finality_offset),
            events,
            from_block,
            from_log_index,
        )
    }

    pub fn with_config(
        client: Arc<dyn EthereumClient>,
        config: SyncerConfig,
        events: Vec<EventType>,
        from_block: BlockNumber,
        from_log_index: u64,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.channel_capacity.max(1));
        Self {
            client,
            events,
            from_block,
            from_log_index,
            config,
            running: AtomicBool::new(false),
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    pub fn events(&self) -> &[EventType] {
        &self.events
    }

    /// Produce logs until `shutdown` fires or an RPC call fails for good.
    ///
    /// May be called only once per instance.
    pub async fn run(&self, shutdown: &Shutdown) -> SyncerResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SyncerError::AlreadyRunning);
        }
        info!(
            from_block = self.from_block,
            from_log_index = self.from_log_index,
            events = self.events.len(),
            "[event-syncer] starting"
        );

        let block_number_opts = self.config.retry.clone().label("eth_blockNumber");
        let page_span = self.config.page_size.max(1) - 1;
        let mut from_block = self.from_block;

        loop {
            let head = retry(shutdown, &block_number_opts, || self.client.block_number()).await?;
            let to_block = head
                .checked_sub(self.config.finality_offset)
                .map(|max_to| min(from_block.saturating_add(page_span), max_to))
                .filter(|to| *to >= from_block);

            let Some(to_block) = to_block else {
                debug!(head, from_block, "[event-syncer] no new finalized blocks");
                self.sleep(shutdown).await?;
                continue;
            };

            let logs = self.fetch_page(shutdown, from_block, to_block).await?;
            debug!(
                from_block,
                to_block,
                logs = logs.len(),
                "[event-syncer] fetched page"
            );
            for (log, event_type) in logs {
                if log.position() < (self.from_block, self.from_log_index) {
                    continue;
                }
                self.send(shutdown, SyncItem::Log { log, event_type }).await?;
            }
            self.send(shutdown, SyncItem::Terminator(to_block)).await?;

            from_block = to_block + 1;
        }
    }

    /// The next event or terminator, in `(block_number, log_index)` order.
    pub async fn next(&self, shutdown: &Shutdown) -> SyncerResult<EventSyncUpdate> {
        let mut receiver = self.receiver.lock().await;
        let item = tokio::select! {
            biased;
            _ = shutdown.wait() => return Err(SyncerError::Cancelled),
            item = receiver.recv() => item.ok_or(SyncerError::ChannelClosed)?,
        };

        match item {
            SyncItem::Log { log, event_type } => {
                let event = event_type.kind.decode(&log)?;
                Ok(EventSyncUpdate {
                    event: Some(event),
                    block_number: log.block_number,
                    log_index: log.log_index,
                })
            }
            SyncItem::Terminator(block_number) => Ok(EventSyncUpdate {
                event: None,
                block_number,
                log_index: 0,
            }),
        }
    }

    async fn fetch_page(
        &self,
        shutdown: &Shutdown,
        from_block: BlockNumber,
        to_block: BlockNumber,
    ) -> SyncerResult<Vec<(Log, EventType)>> {
        let opts = self.config.retry.clone().label("eth_getLogs");
        let queries = self.events.iter().map(|event_type| {
            let opts = &opts;
            async move {
                let logs = retry(shutdown, opts, || {
                    event_type
                        .contract
                        .filter(event_type.kind, from_block, to_block)
                })
                .await?;
                Ok::<_, SyncerError>(
                    logs.into_iter()
                        .map(|log| (log, event_type.clone()))
                        .collect::<Vec<_>>(),
                )
            }
        });

        let mut merged: Vec<(Log, EventType)> =
            try_join_all(queries).await?.into_iter().flatten().collect();
        merged.sort_by_key(|(log, _)| log.position());
        Ok(merged)
    }

    async fn send(&self, shutdown: &Shutdown, item: SyncItem) -> SyncerResult<()> {
        tokio::select! {
            biased;
            _ = shutdown.wait() => Err(SyncerError::Cancelled),
            res = self.sender.send(item) => res.map_err(|_| SyncerError::ChannelClosed),
        }
    }

    async fn sleep(&self, shutdown: &Shutdown) -> SyncerResult<()> {
        tokio::select! {
            biased;
            _ = shutdown.wait() => Err(SyncerError::Cancelled),
            _ = self.config.clock.sleep(self.config.poll_interval) => Ok(()),
        }
    }
}

impl fmt::Debug for EventSyncer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSyncer")
            .field("events", &self.events)
            .field("from_block", &self.from_block)
            .field("from_log_index", &self.from_log_index)
            .field("config", &self.config)
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish()
    }
}
