//! The retry loop.

use std::future::Future;

use shared_types::Shutdown;
use tracing::debug;

use crate::error::{RetryError, RetryResult};
use crate::options::RetryOptions;

/// Call `f` until it succeeds, hits a stop error, runs out of attempts or
/// `shutdown` is triggered.
///
/// Cancellation is checked before every call, while a call is in flight and
/// during every backoff sleep.
pub async fn retry<T, E, F, Fut>(
    shutdown: &Shutdown,
    opts: &RetryOptions<E>,
    mut f: F,
) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut interval = opts.interval;
    let mut attempts: u64 = 0;

    loop {
        if shutdown.is_triggered() {
            return Err(RetryError::Cancelled);
        }

        let outcome = tokio::select! {
            biased;
            _ = shutdown.wait() => return Err(RetryError::Cancelled),
            res = f() => res,
        };
        attempts += 1;

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if shutdown.is_triggered() {
            return Err(RetryError::Cancelled);
        }
        if opts.is_stop_error(&err) {
            debug!(op = opts.label, attempts, error = %err, "stop error, not retrying");
            return Err(RetryError::Stopped(err));
        }
        if let Some(max_retries) = opts.retries {
            if attempts > max_retries {
                debug!(op = opts.label, attempts, error = %err, "retry limit reached");
                return Err(RetryError::Exhausted {
                    attempts,
                    last: err,
                });
            }
        }

        debug!(
            op = opts.label,
            attempts,
            delay_ms = interval.as_millis() as u64,
            error = %err,
            "call failed, retrying"
        );

        tokio::select! {
            biased;
            _ = shutdown.wait() => return Err(RetryError::Cancelled),
            _ = opts.clock.sleep(interval) => {}
        }
        interval = opts.next_interval(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{MockClock, ShutdownSignal};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum TestError {
        Flaky,
        Fatal,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    fn opts(clock: &MockClock) -> RetryOptions<TestError> {
        RetryOptions::default().with_clock(Arc::new(clock.clone()))
    }

    #[tokio::test]
    async fn test_first_call_succeeds() {
        let clock = MockClock::default();
        let res = retry(&Shutdown::never(), &opts(&clock), || async {
            Ok::<_, TestError>(42)
        })
        .await;
        assert_eq!(res, Ok(42));
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_default_makes_four_calls_then_returns_last_error() {
        let clock = MockClock::default();
        let calls = AtomicU64::new(0);
        let res: RetryResult<(), _> = retry(&Shutdown::never(), &opts(&clock), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Flaky) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            res,
            Err(RetryError::Exhausted {
                attempts: 4,
                last: TestError::Flaky
            })
        );
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2); 3]);
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let clock = MockClock::default();
        let calls = AtomicU64::new(0);
        let res = retry(&Shutdown::never(), &opts(&clock), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(TestError::Flaky)
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(res, Ok(2));
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[tokio::test]
    async fn test_exponential_backoff_schedule() {
        let clock = MockClock::default();
        let opts = opts(&clock)
            .number_of_retries(5)
            .interval(Duration::from_secs(1))
            .max_interval(Duration::from_secs(6))
            .exponential_backoff(Some(2.0))
            .unwrap();
        let _: RetryResult<(), _> =
            retry(&Shutdown::never(), &opts, || async { Err(TestError::Flaky) }).await;

        let secs: Vec<u64> = clock.sleeps().iter().map(|d| d.as_secs()).collect();
        assert_eq!(secs, vec![1, 2, 4, 6, 6]);
    }

    #[tokio::test]
    async fn test_stop_on_returns_immediately() {
        let clock = MockClock::default();
        let calls = AtomicU64::new(0);
        let opts = opts(&clock).stop_on(|e| *e == TestError::Fatal);
        let res: RetryResult<(), _> = retry(&Shutdown::never(), &opts, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Fatal) }
        })
        .await;
        assert_eq!(res, Err(RetryError::Stopped(TestError::Fatal)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_infinite_retries_until_success() {
        let clock = MockClock::default();
        let calls = AtomicU64::new(0);
        let opts = opts(&clock).infinite();
        let res = retry(&Shutdown::never(), &opts, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 20 {
                    Err(TestError::Flaky)
                } else {
                    Ok(())
                }
            }
        })
        .await;
        assert!(res.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 21);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_call() {
        let (signal, shutdown) = ShutdownSignal::new();
        signal.trigger();
        let calls = AtomicU64::new(0);
        let res: RetryResult<(), TestError> = retry(&shutdown, &RetryOptions::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;
        assert_eq!(res, Err(RetryError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_after_failed_call_wins_over_retry() {
        let (signal, shutdown) = ShutdownSignal::new();
        let clock = MockClock::default();
        let res: RetryResult<(), _> = retry(&shutdown, &opts(&clock).infinite(), || {
            signal.trigger();
            async { Err(TestError::Flaky) }
        })
        .await;
        assert_eq!(res, Err(RetryError::Cancelled));
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_sleep() {
        let (signal, shutdown) = ShutdownSignal::new();
        let opts = RetryOptions::<TestError>::default()
            .infinite()
            .interval(Duration::from_secs(3600));

        let handle = tokio::spawn(async move {
            retry(&shutdown, &opts, || async { Err::<(), _>(TestError::Flaky) }).await
        });
        tokio::time::sleep(Duration::from_secs(10)).await;
        signal.trigger();

        let res = handle.await.unwrap();
        assert!(res.unwrap_err().is_cancelled());
    }

    #[test]
    fn test_into_inner() {
        assert_eq!(
            RetryError::Stopped(TestError::Fatal).into_inner(),
            Some(TestError::Fatal)
        );
        assert_eq!(RetryError::<TestError>::Cancelled.into_inner(), None);
    }
}
