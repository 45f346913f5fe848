//! Retry configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use shared_types::{Clock, SystemClock};

use crate::error::RetryError;

/// Multiplier used when exponential backoff is requested without a value.
pub const DEFAULT_EXPONENTIAL_MULTIPLIER: f64 = 1.5;

type StopPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Options for [`retry`](crate::retry).
///
/// Defaults: 3 retries, 2 s initial interval, 60 s cap, constant backoff.
pub struct RetryOptions<E> {
    pub(crate) retries: Option<u64>,
    pub(crate) interval: Duration,
    pub(crate) max_interval: Duration,
    pub(crate) multiplier: f64,
    pub(crate) stop_on: Vec<StopPredicate<E>>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) label: &'static str,
}

impl<E> Default for RetryOptions<E> {
    fn default() -> Self {
        Self {
            retries: Some(3),
            interval: Duration::from_secs(2),
            max_interval: Duration::from_secs(60),
            multiplier: 1.0,
            stop_on: Vec::new(),
            clock: Arc::new(SystemClock),
            label: "operation",
        }
    }
}

impl<E> Clone for RetryOptions<E> {
    fn clone(&self) -> Self {
        Self {
            retries: self.retries,
            interval: self.interval,
            max_interval: self.max_interval,
            multiplier: self.multiplier,
            stop_on: self.stop_on.clone(),
            clock: Arc::clone(&self.clock),
            label: self.label,
        }
    }
}

impl<E> fmt::Debug for RetryOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("retries", &self.retries)
            .field("interval", &self.interval)
            .field("max_interval", &self.max_interval)
            .field("multiplier", &self.multiplier)
            .field("stop_on", &self.stop_on.len())
            .field("label", &self.label)
            .finish()
    }
}

impl<E> RetryOptions<E> {
    /// Number of calls after the first one. Negative means infinite.
    pub fn number_of_retries(mut self, n: i64) -> Self {
        self.retries = u64::try_from(n).ok();
        self
    }

    /// Retry until success, a stop error or shutdown.
    pub fn infinite(mut self) -> Self {
        self.retries = None;
        self
    }

    /// Delay before the first retry.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Upper bound for the delay between two attempts.
    pub fn max_interval(mut self, max: Duration) -> Self {
        self.max_interval = max;
        self
    }

    /// Grow the interval by `multiplier` after every retry.
    ///
    /// `None` selects [`DEFAULT_EXPONENTIAL_MULTIPLIER`]. A multiplier of 1.0
    /// or less is rejected since it would not be exponential.
    pub fn exponential_backoff(mut self, multiplier: Option<f64>) -> Result<Self, RetryError<E>> {
        let m = multiplier.unwrap_or(DEFAULT_EXPONENTIAL_MULTIPLIER);
        if m <= 1.0 || !m.is_finite() {
            return Err(RetryError::InvalidOptions(format!(
                "exponential multiplier must be > 1.0, got {m}"
            )));
        }
        self.multiplier = m;
        Ok(self)
    }

    /// Stop retrying when `predicate` matches the returned error.
    pub fn stop_on<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.stop_on.push(Arc::new(predicate));
        self
    }

    /// Use `clock` for delays instead of the tokio timer.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Name used in log lines.
    pub fn label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    pub(crate) fn is_stop_error(&self, err: &E) -> bool {
        self.stop_on.iter().any(|p| p(err))
    }

    /// Interval following `current`.
    pub(crate) fn next_interval(&self, current: Duration) -> Duration {
        if current.as_secs_f64() >= self.max_interval.as_secs_f64() / self.multiplier {
            self.max_interval
        } else {
            current.mul_f64(self.multiplier)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = RetryOptions::<()>::default();
        assert_eq!(opts.retries, Some(3));
        assert_eq!(opts.interval, Duration::from_secs(2));
        assert_eq!(opts.max_interval, Duration::from_secs(60));
        assert_eq!(opts.multiplier, 1.0);
    }

    #[test]
    fn test_negative_retries_is_infinite() {
        let opts = RetryOptions::<()>::default().number_of_retries(-1);
        assert_eq!(opts.retries, None);
    }

    #[test]
    fn test_exponential_default_multiplier() {
        let opts = RetryOptions::<()>::default().exponential_backoff(None).unwrap();
        assert_eq!(opts.multiplier, DEFAULT_EXPONENTIAL_MULTIPLIER);
    }

    #[test]
    fn test_exponential_rejects_non_growing_multiplier() {
        assert!(RetryOptions::<()>::default()
            .exponential_backoff(Some(1.0))
            .is_err());
        assert!(RetryOptions::<()>::default()
            .exponential_backoff(Some(0.5))
            .is_err());
    }

    #[test]
    fn test_next_interval_caps_at_max() {
        let opts = RetryOptions::<()>::default()
            .interval(Duration::from_secs(1))
            .max_interval(Duration::from_secs(5))
            .exponential_backoff(Some(2.0))
            .unwrap();
        let mut d = opts.interval;
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(d.as_secs());
            d = opts.next_interval(d);
        }
        assert_eq!(seen, vec![1, 2, 4, 5, 5]);
    }

    #[test]
    fn test_constant_interval_stays() {
        let opts = RetryOptions::<()>::default();
        assert_eq!(opts.next_interval(opts.interval), Duration::from_secs(2));
    }
}
