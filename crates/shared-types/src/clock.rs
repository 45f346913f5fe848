//! # Clock Capability
//!
//! Wall-clock reads and sleeps go through [`Clock`] so that retry loops,
//! pollers and sync timestamps can run against virtual time in tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Source of time and delays.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Real time backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: `sleep` returns immediately and advances `now`.
///
/// Every requested delay is recorded so tests can assert on backoff schedules.
#[derive(Debug, Clone)]
pub struct MockClock {
    inner: Arc<Mutex<MockClockState>>,
}

#[derive(Debug)]
struct MockClockState {
    now: DateTime<Utc>,
    sleeps: Vec<Duration>,
}

impl MockClock {
    /// Start the virtual clock at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockClockState {
                now: start,
                sleeps: Vec::new(),
            })),
        }
    }

    /// Advance time without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.inner.lock();
        state.now += chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
    }

    /// All delays requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner.lock().sleeps.clone()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }
}

#[async_trait]
impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        self.inner.lock().now
    }

    async fn sleep(&self, duration: Duration) {
        {
            let mut state = self.inner.lock();
            state.sleeps.push(duration);
            state.now += chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
        }
        tokio::task::yield_now().await;
    }
}
