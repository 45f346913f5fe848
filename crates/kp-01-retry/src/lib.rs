//! # KP-01 Retry Executor
//!
//! Wraps any fallible async operation with retries.
//!
//! ## Semantics
//!
//! - The operation runs immediately; after each failure the executor waits
//!   `interval` and tries again, growing the interval by `multiplier` up to
//!   `max_interval`.
//! - `number_of_retries` counts the calls after the first one. A negative
//!   value means "retry forever".
//! - Errors matched by a `stop_on` predicate are returned at once.
//! - A triggered [`Shutdown`](shared_types::Shutdown) aborts between and
//!   during attempts with [`RetryError::Cancelled`].
//!
//! ## Example
//!
//! ```ignore
//! let opts = RetryOptions::default().number_of_retries(5);
//! let head = retry(&shutdown, &opts, || client.block_number()).await?;
//! ```

pub mod error;
pub mod executor;
pub mod options;

pub use error::{RetryError, RetryResult};
pub use executor::retry;
pub use options::{RetryOptions, DEFAULT_EXPONENTIAL_MULTIPLIER};
